//! Dataset Schema
//! Column names and the categorical values the figures select on.

/// Year of the observation.
pub const PERIOD: &str = "periodo";
/// Cause of death.
pub const CAUSE: &str = "causa_mortalidad";
/// Sex of the population.
pub const SEX: &str = "sexo";
/// Location name (region, province or health department).
pub const LOCATION: &str = "ubicacion";
/// Province the location belongs to.
pub const PROVINCE: &str = "provincia";
/// Granularity of the location.
pub const GEO_LEVEL: &str = "nivel_geografico";
/// Age-adjusted mortality rate per 100,000.
pub const MORTALITY_RATE: &str = "tasa_mortalidad";
/// Life expectancy at 65, in years.
pub const LIFE_EXPECTANCY: &str = "esperanza_vida";

/// Every column the loader requires, in output order.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    PERIOD,
    CAUSE,
    SEX,
    LOCATION,
    PROVINCE,
    GEO_LEVEL,
    MORTALITY_RATE,
    LIFE_EXPECTANCY,
];

/// Location name of the regional aggregate.
pub const REGION: &str = "Comunitat Valenciana";

/// First and last year covered by the dataset.
pub const FIRST_YEAR: i32 = 2010;
pub const LAST_YEAR: i32 = 2023;

/// Cause of death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cause {
    General,
    Cancer,
    Cardio,
    Cerebrovascular,
    Suicide,
}

impl Cause {
    /// All causes, general mortality first.
    pub const ALL: [Cause; 5] = [
        Cause::General,
        Cause::Cancer,
        Cause::Cardio,
        Cause::Cerebrovascular,
        Cause::Suicide,
    ];

    /// The four specific causes.
    pub const SPECIFIC: [Cause; 4] = [
        Cause::Cancer,
        Cause::Cardio,
        Cause::Cerebrovascular,
        Cause::Suicide,
    ];

    /// Literal used in the `causa_mortalidad` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Cause::General => "General",
            Cause::Cancer => "Cancer",
            Cause::Cardio => "Cardio",
            Cause::Cerebrovascular => "Cerebro",
            Cause::Suicide => "Suicidio",
        }
    }

    /// Parse a `causa_mortalidad` literal.
    pub fn from_literal(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }

    /// Short label for axes and legends.
    pub fn label(self) -> &'static str {
        match self {
            Cause::General => "Mortalidad General",
            Cause::Cancer => "Cáncer",
            Cause::Cardio => "Cardiopatía Isquémica",
            Cause::Cerebrovascular => "Enf. Cerebrovascular",
            Cause::Suicide => "Suicidio",
        }
    }

    /// Longer label used for panel titles.
    pub fn title(self) -> &'static str {
        match self {
            Cause::General => "Mortalidad General",
            Cause::Cancer => "Cáncer (Neoplasias)",
            Cause::Cardio => "Cardiopatía Isquémica",
            Cause::Cerebrovascular => "Enfermedad Cerebrovascular",
            Cause::Suicide => "Suicidio",
        }
    }
}

/// Sex breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sex {
    Both,
    Male,
    Female,
}

impl Sex {
    pub const ALL: [Sex; 3] = [Sex::Both, Sex::Male, Sex::Female];

    /// Literal used in the `sexo` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Both => "Ambos sexos",
            Sex::Male => "Hombres",
            Sex::Female => "Mujeres",
        }
    }
}

/// Granularity of a row's location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeoLevel {
    Region,
    Province,
    HospitalZone,
}

impl GeoLevel {
    pub const ALL: [GeoLevel; 3] = [GeoLevel::Region, GeoLevel::Province, GeoLevel::HospitalZone];

    /// Literal used in the `nivel_geografico` column.
    pub fn as_str(self) -> &'static str {
        match self {
            GeoLevel::Region => "COMUNITAT",
            GeoLevel::Province => "PROVINCIA",
            GeoLevel::HospitalZone => "HOSPITAL/ZONA SALUD",
        }
    }

    /// Classify a `nivel_geografico` literal. Unknown values are region level.
    pub fn classify(value: &str) -> Self {
        match value {
            "PROVINCIA" => GeoLevel::Province,
            "HOSPITAL/ZONA SALUD" => GeoLevel::HospitalZone,
            _ => GeoLevel::Region,
        }
    }
}

/// The three provinces, in legend order.
pub const PROVINCES: [&str; 3] = ["Alicante", "Valencia", "Castellón"];

/// Numeric column a query aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    MortalityRate,
    LifeExpectancy,
}

impl Metric {
    pub fn column(self) -> &'static str {
        match self {
            Metric::MortalityRate => MORTALITY_RATE,
            Metric::LifeExpectancy => LIFE_EXPECTANCY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cause_literals_round_trip() {
        for cause in Cause::ALL {
            assert_eq!(Cause::from_literal(cause.as_str()), Some(cause));
        }
        assert_eq!(Cause::from_literal("Cerebrovascular"), None);
    }

    #[test]
    fn geo_level_classification() {
        assert_eq!(GeoLevel::classify("PROVINCIA"), GeoLevel::Province);
        assert_eq!(
            GeoLevel::classify("HOSPITAL/ZONA SALUD"),
            GeoLevel::HospitalZone
        );
        assert_eq!(GeoLevel::classify("COMUNITAT AUTONOMA"), GeoLevel::Region);
    }
}
