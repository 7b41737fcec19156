use crate::config::FeatureConfig;
use crate::error::{ScoringError, TransformError};
use crate::ml::classifier::GradientBoostedClassifier;
use crate::ml::models::CanonicalFeatureVector;
use crate::ml::scaler::{FeatureMap, Normalizer, NormalizerKind};
use crate::models::RawVehicleRecord;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use strum::{EnumIter, IntoEnumIterator};

pub const ENGINE_LOAD: &str = "Engine_Load";
pub const ENGINE_RPM: &str = "Engine_RPM";
pub const ENGINE_COOLANT_TEMP: &str = "Engine_Coolant_Temp";
pub const VIBRATION: &str = "Vibration";
pub const MASS_AIR_FLOW_RATE: &str = "Mass_Air_Flow_Rate";
pub const ENGINE_OIL_TEMP: &str = "Engine_Oil_Temp";
pub const TRIP_DISTANCE: &str = "Trip_Distance";
pub const TRIP_TIME_JOURNEY: &str = "Trip_Time_journey";
pub const TURBO_BOOST_AND_VCM_GAUGE: &str = "Turbo_Boost_And_Vcm_Gauge";

/// Raw (lowercase) field name to canonical feature name.
///
/// `Trip_Time_journey` keeps the spelling the classifier was fit with.
pub const CANONICAL_FIELDS: &[(&str, &str)] = &[
    ("engine_load", ENGINE_LOAD),
    ("engine_rpm", ENGINE_RPM),
    ("engine_coolant_temp", ENGINE_COOLANT_TEMP),
    ("vibration", VIBRATION),
    ("mass_air_flow_rate", MASS_AIR_FLOW_RATE),
    ("engine_oil_temp", ENGINE_OIL_TEMP),
    ("throttle_pos_manifold", "Throttle_Pos_Manifold"),
    ("accel_ssor_total", "Accel_Ssor_Total"),
    ("trip_distance", TRIP_DISTANCE),
    ("trip_time_journey", TRIP_TIME_JOURNEY),
    ("turbo_boost_and_vcm_gauge", TURBO_BOOST_AND_VCM_GAUGE),
    ("litres_per_100km_inst", "Litres_Per_100km_Inst"),
    ("vehicle_speed_sensor", "Vehicle_speed_sensor"),
    ("co2_in_g_per_km_inst", "CO2_in_g_per_km_Inst"),
    ("speed_gps", "Speed_GPS"),
    ("speed_obd", "Speed_OBD"),
    ("intake_manifold_pressure", "Intake_Manifold_Pressure"),
    ("intake_air_temp", "Intake_Air_Temp"),
    ("voltage_control_module", "Voltage_Control_Module"),
    ("ambient_air_temp", "Ambient_Air_Temp"),
    ("accel_pedal_pos_d", "Accel_Pedal_Pos_D"),
];

/// Features computed at inference time from scaled base features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize)]
pub enum DerivedFeature {
    ConditionScore,
    OverstrainRisk,
    HeatDissipationRisk,
    PowerFailureRisk,
}

impl DerivedFeature {
    pub fn name(&self) -> &'static str {
        match self {
            DerivedFeature::ConditionScore => "Condition_Score",
            DerivedFeature::OverstrainRisk => "Overstrain_Risk",
            DerivedFeature::HeatDissipationRisk => "Heat_Dissipation_Risk",
            DerivedFeature::PowerFailureRisk => "Power_Failure_Risk",
        }
    }

    pub fn inputs(&self) -> &'static [&'static str] {
        match self {
            DerivedFeature::ConditionScore => &[
                ENGINE_LOAD,
                ENGINE_RPM,
                ENGINE_COOLANT_TEMP,
                TRIP_DISTANCE,
                TRIP_TIME_JOURNEY,
                VIBRATION,
            ],
            DerivedFeature::OverstrainRisk => &[ENGINE_LOAD, ENGINE_RPM],
            DerivedFeature::HeatDissipationRisk => &[ENGINE_COOLANT_TEMP, ENGINE_OIL_TEMP],
            DerivedFeature::PowerFailureRisk => &[MASS_AIR_FLOW_RATE, TURBO_BOOST_AND_VCM_GAUGE],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::iter().find(|d| d.name().eq_ignore_ascii_case(name))
    }

    /// Compute from scaled inputs; `None` if any input is absent
    pub fn compute(&self, f: &FeatureMap) -> Option<f64> {
        let v = |name: &str| f.get(name).copied();
        match self {
            DerivedFeature::ConditionScore => {
                let load = v(ENGINE_LOAD)?;
                let rpm = v(ENGINE_RPM)?;
                let coolant = v(ENGINE_COOLANT_TEMP)?;
                let engine_health = (load + rpm + coolant) / 3.0;
                let usage_severity = load * (v(TRIP_DISTANCE)? + v(TRIP_TIME_JOURNEY)?);
                // Thresholds apply to scaled values
                let anomaly_flag = if v(VIBRATION)? > 0.7 || coolant > 0.8 {
                    1.0
                } else {
                    0.0
                };
                Some(0.5 * engine_health + 0.3 * usage_severity + 0.2 * anomaly_flag)
            }
            DerivedFeature::OverstrainRisk => Some(0.5 * v(ENGINE_LOAD)? + 0.5 * v(ENGINE_RPM)?),
            DerivedFeature::HeatDissipationRisk => {
                Some(0.4 * v(ENGINE_COOLANT_TEMP)? + 0.6 * v(ENGINE_OIL_TEMP)?)
            }
            DerivedFeature::PowerFailureRisk => {
                Some(0.5 * v(MASS_AIR_FLOW_RATE)? + 0.5 * v(TURBO_BOOST_AND_VCM_GAUGE)?)
            }
        }
    }
}

/// Features the transformer is able to emit
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSchema {
    /// Base features sourced from the record (scaled or passthrough) that
    /// some raw field name maps to
    pub base: BTreeSet<String>,

    /// Derived features whose inputs are all base features
    pub derived: Vec<DerivedFeature>,
}

impl FeatureSchema {
    fn new(
        normalizer: &dyn Normalizer,
        passthrough: &[String],
        aliases: &HashMap<String, String>,
    ) -> Self {
        let mappable: BTreeSet<&str> = aliases.values().map(String::as_str).collect();
        let base: BTreeSet<String> = normalizer
            .scaled_features()
            .into_iter()
            .map(str::to_string)
            .chain(passthrough.iter().cloned())
            .filter(|name| DerivedFeature::from_name(name).is_none())
            .filter(|name| mappable.contains(name.as_str()))
            .collect();

        let derived = DerivedFeature::iter()
            .filter(|d| d.inputs().iter().all(|input| base.contains(*input)))
            .collect();

        Self { base, derived }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.base.contains(name) || self.derived.iter().any(|d| d.name() == name)
    }

    /// Every emitted feature name, base first
    pub fn emitted(&self) -> Vec<String> {
        self.base
            .iter()
            .cloned()
            .chain(self.derived.iter().map(|d| d.name().to_string()))
            .collect()
    }
}

/// Maps raw vehicle records to the classifier's canonical feature vector
#[derive(Debug, Clone)]
pub struct FeatureTransformer {
    /// Lowercase raw name -> canonical name
    aliases: HashMap<String, String>,

    normalizer: Arc<dyn Normalizer>,

    /// Model column order
    model_features: Arc<[String]>,

    schema: FeatureSchema,
}

impl FeatureTransformer {
    pub fn new(
        config: &FeatureConfig,
        normalizer: Arc<dyn Normalizer>,
        classifier: &GradientBoostedClassifier,
    ) -> Self {
        let mut aliases: HashMap<String, String> = CANONICAL_FIELDS
            .iter()
            .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
            .collect();
        for (raw, canonical) in &config.aliases {
            aliases.insert(raw.to_ascii_lowercase(), canonical.clone());
        }

        let schema = FeatureSchema::new(normalizer.as_ref(), &config.passthrough, &aliases);

        Self {
            aliases,
            normalizer,
            model_features: classifier.shared_feature_names(),
            schema,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn normalizer_kind(&self) -> NormalizerKind {
        self.normalizer.kind()
    }

    /// Compare the model's feature list with what this transformer emits.
    ///
    /// Extra emitted features are fine; a model feature the pipeline cannot
    /// produce means the artifacts are out of sync. A feature the scaler
    /// knows but no raw field name maps to counts as one the pipeline cannot
    /// produce.
    pub fn check_schema(&self) -> Result<(), ScoringError> {
        let mut missing: Vec<String> = self
            .model_features
            .iter()
            .filter(|name| !self.schema.contains(name))
            .cloned()
            .collect();

        // The holistic scaler needs every fitted column in each record
        if self.normalizer.kind() == NormalizerKind::Holistic {
            for name in self.normalizer.scaled_features() {
                if !self.schema.base.contains(name) && !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ScoringError::FeatureMismatch {
                missing,
                unexpected: Vec::new(),
            })
        }
    }

    /// Turn a raw record into the model's canonical feature vector
    pub fn transform(
        &self,
        raw: &RawVehicleRecord,
    ) -> Result<CanonicalFeatureVector, TransformError> {
        let base = self.canonicalize(raw)?;
        let mut features = self.normalizer.scale(base)?;

        for derived in &self.schema.derived {
            if let Some(value) = derived.compute(&features) {
                features.insert(derived.name().to_string(), value);
            }
        }

        let values = self
            .model_features
            .iter()
            .map(|name| {
                features
                    .get(name)
                    .copied()
                    .ok_or_else(|| self.missing_feature(name, &features))
            })
            .collect::<Result<Vec<f64>, TransformError>>()?;

        Ok(CanonicalFeatureVector::from_parts(
            Arc::clone(&self.model_features),
            values,
        ))
    }

    /// Collect base features present in the record, keyed by canonical name
    fn canonicalize(&self, raw: &RawVehicleRecord) -> Result<FeatureMap, TransformError> {
        let mut base = FeatureMap::new();
        let mut sources: HashMap<&str, &str> = HashMap::new();

        for (key, value) in raw.fields() {
            let Some(canonical) = self.aliases.get(&key.to_ascii_lowercase()) else {
                continue;
            };
            if !self.schema.base.contains(canonical) {
                continue;
            }

            if let Some(previous) = sources.insert(canonical.as_str(), key) {
                return Err(TransformError::InvalidValue {
                    name: canonical.clone(),
                    reason: format!("supplied twice (as {} and {})", previous, key),
                });
            }

            if let Some(number) = parse_value(canonical, value)? {
                base.insert(canonical.clone(), number);
            }
        }

        Ok(base)
    }

    fn missing_feature(&self, name: &str, features: &FeatureMap) -> TransformError {
        let root = DerivedFeature::from_name(name)
            .and_then(|d| {
                d.inputs()
                    .iter()
                    .find(|input| !features.contains_key(**input))
                    .copied()
            })
            .unwrap_or(name);
        TransformError::MissingFeature(root.to_string())
    }
}

/// Numeric value of a raw field; `None` for null
fn parse_value(name: &str, value: &Value) -> Result<Option<f64>, TransformError> {
    let invalid = |reason: String| TransformError::InvalidValue {
        name: name.to_string(),
        reason,
    };

    let number = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| invalid(format!("unrepresentable number {}", n)))?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| invalid(format!("not a number: {:?}", s)))?
        }
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Array(_) | Value::Object(_) => {
            return Err(invalid("expected a scalar value".to_string()))
        }
    };

    if !number.is_finite() {
        return Err(invalid(format!("non-finite value {}", number)));
    }
    Ok(Some(number))
}
