//! Per-measurement metadata: motor positions, environment values and counters.

/// How an attribute is combined when measurements are merged into a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AverageMode {
    /// Arithmetic mean.
    Average,
    /// Value of the last measurement (running counters).
    Last,
    /// Sum over measurements (per-exposure increments).
    Sum,
}

/// Numeric metadata attributes, in output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaAttribute {
    MotorX,
    MotorY,
    MotorZ,
    Omega,
    MidTth,
    Phi,
    Chi,
    MotorPst,
    MotorSst,
    MotorOmegaM,
    Temperature,
    TeLoad,
    TePos,
    TeExt,
    Xe,
    Ye,
    Ze,
    MonitorCount,
    DeltaMonitorCount,
    Time,
    DeltaTime,
}

impl MetaAttribute {
    /// Number of numeric attributes.
    pub const COUNT: usize = 21;

    pub const ALL: [MetaAttribute; Self::COUNT] = [
        MetaAttribute::MotorX,
        MetaAttribute::MotorY,
        MetaAttribute::MotorZ,
        MetaAttribute::Omega,
        MetaAttribute::MidTth,
        MetaAttribute::Phi,
        MetaAttribute::Chi,
        MetaAttribute::MotorPst,
        MetaAttribute::MotorSst,
        MetaAttribute::MotorOmegaM,
        MetaAttribute::Temperature,
        MetaAttribute::TeLoad,
        MetaAttribute::TePos,
        MetaAttribute::TeExt,
        MetaAttribute::Xe,
        MetaAttribute::Ye,
        MetaAttribute::Ze,
        MetaAttribute::MonitorCount,
        MetaAttribute::DeltaMonitorCount,
        MetaAttribute::Time,
        MetaAttribute::DeltaTime,
    ];

    /// ASCII tag used in exported tables.
    pub fn tag(&self) -> &'static str {
        match self {
            MetaAttribute::MotorX => "X",
            MetaAttribute::MotorY => "Y",
            MetaAttribute::MotorZ => "Z",
            MetaAttribute::Omega => "omega",
            MetaAttribute::MidTth => "mid2theta",
            MetaAttribute::Phi => "phi",
            MetaAttribute::Chi => "chi",
            MetaAttribute::MotorPst => "PST",
            MetaAttribute::MotorSst => "SST",
            MetaAttribute::MotorOmegaM => "OmegaM",
            MetaAttribute::Temperature => "T",
            MetaAttribute::TeLoad => "teload",
            MetaAttribute::TePos => "tepos",
            MetaAttribute::TeExt => "teext",
            MetaAttribute::Xe => "xe",
            MetaAttribute::Ye => "ye",
            MetaAttribute::Ze => "ze",
            MetaAttribute::MonitorCount => "mon",
            MetaAttribute::DeltaMonitorCount => "delta_mon",
            MetaAttribute::Time => "t",
            MetaAttribute::DeltaTime => "delta_t",
        }
    }

    /// Display tag with Greek symbols.
    pub fn nice_tag(&self) -> &'static str {
        match self {
            MetaAttribute::Omega => "ω",
            MetaAttribute::MidTth => "mid 2θ",
            MetaAttribute::Phi => "φ",
            MetaAttribute::Chi => "χ",
            MetaAttribute::MotorOmegaM => "ΩM",
            MetaAttribute::DeltaMonitorCount => "Δmon",
            MetaAttribute::DeltaTime => "Δt",
            other => other.tag(),
        }
    }

    pub fn average_mode(&self) -> AverageMode {
        match self {
            MetaAttribute::MonitorCount | MetaAttribute::Time => AverageMode::Last,
            MetaAttribute::DeltaMonitorCount | MetaAttribute::DeltaTime => AverageMode::Sum,
            _ => AverageMode::Average,
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Metadata attached to one measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    values: [f64; MetaAttribute::COUNT],
    pub date: String,
    pub comment: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            values: [0.0; MetaAttribute::COUNT],
            date: String::new(),
            comment: String::new(),
        }
    }
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, attr: MetaAttribute) -> f64 {
        self.values[attr.index()]
    }

    #[inline]
    pub fn set(&mut self, attr: MetaAttribute, value: f64) {
        self.values[attr.index()] = value;
    }

    /// Builder-style setter.
    pub fn with(mut self, attr: MetaAttribute, value: f64) -> Self {
        self.set(attr, value);
        self
    }

    pub fn omg(&self) -> f64 {
        self.get(MetaAttribute::Omega)
    }

    pub fn phi(&self) -> f64 {
        self.get(MetaAttribute::Phi)
    }

    pub fn chi(&self) -> f64 {
        self.get(MetaAttribute::Chi)
    }

    pub fn mid_tth(&self) -> f64 {
        self.get(MetaAttribute::MidTth)
    }

    pub fn monitor_count(&self) -> f64 {
        self.get(MetaAttribute::MonitorCount)
    }

    pub fn delta_monitor_count(&self) -> f64 {
        self.get(MetaAttribute::DeltaMonitorCount)
    }

    pub fn time(&self) -> f64 {
        self.get(MetaAttribute::Time)
    }

    pub fn delta_time(&self) -> f64 {
        self.get(MetaAttribute::DeltaTime)
    }

    /// Numeric values in [`MetaAttribute::ALL`] order.
    pub fn numeric_values(&self) -> &[f64] {
        &self.values
    }

    /// Combine metadata of several measurements, attribute by attribute
    /// according to [`MetaAttribute::average_mode`]. Date and comment come
    /// from the first entry.
    ///
    /// # Panics
    /// Panics if `all` is empty.
    pub fn average<'a>(all: impl IntoIterator<Item = &'a Metadata>) -> Metadata {
        let all: Vec<&Metadata> = all.into_iter().collect();
        assert!(!all.is_empty(), "cannot average empty metadata list");

        let first = all[0];
        let last = all[all.len() - 1];
        let fac = 1.0 / all.len() as f64;

        let mut ret = Metadata {
            values: [0.0; MetaAttribute::COUNT],
            date: first.date.clone(),
            comment: first.comment.clone(),
        };
        for attr in MetaAttribute::ALL {
            let value = match attr.average_mode() {
                AverageMode::Average => all.iter().map(|m| m.get(attr)).sum::<f64>() * fac,
                AverageMode::Sum => all.iter().map(|m| m.get(attr)).sum(),
                AverageMode::Last => last.get(attr),
            };
            ret.set(attr, value);
        }
        ret
    }
}
