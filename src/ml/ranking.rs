use crate::config::{FeatureConfig, RankingConfig};
use crate::error::{AppError, RecordError, Result};
use crate::metrics::{
    BATCHES_ABORTED_TOTAL, RANKING_DURATION_SECONDS, RECORDS_SCORED_TOTAL, RECORDS_SKIPPED_TOTAL,
};
use crate::ml::artifacts::ModelArtifacts;
use crate::ml::classifier::GradientBoostedClassifier;
use crate::ml::features::FeatureTransformer;
use crate::models::{FailureProbabilities, PredictionResult, RawVehicleRecord};
use crate::state::VehicleStore;
use chrono::{Duration, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

/// A record left out of a ranking, with the reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub vehicle_id: String,

    /// Position in the input batch
    pub index: usize,

    /// Machine-readable reason, e.g. `MISSING_FEATURE`
    pub code: String,

    pub message: String,
}

/// Outcome of ranking one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingReport {
    pub run_id: Uuid,

    /// Scored vehicles, most urgent first
    pub results: Vec<PredictionResult>,

    /// Records that failed the pipeline, in input order
    pub skipped: Vec<SkippedRecord>,

    pub total_records: usize,
}

impl RankingReport {
    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    /// Skipped record count per reason code
    pub fn skip_summary(&self) -> BTreeMap<&str, usize> {
        let mut summary = BTreeMap::new();
        for skipped in &self.skipped {
            *summary.entry(skipped.code.as_str()).or_insert(0) += 1;
        }
        summary
    }
}

/// Scores vehicle records and orders them by failure urgency
pub struct RankingService {
    artifacts: ModelArtifacts,
    transformer: FeatureTransformer,
    config: RankingConfig,
}

impl RankingService {
    pub fn new(artifacts: ModelArtifacts, features: &FeatureConfig, config: RankingConfig) -> Self {
        let transformer = FeatureTransformer::new(
            features,
            artifacts.normalizer.clone(),
            &artifacts.classifier,
        );

        Self {
            artifacts,
            transformer,
            config,
        }
    }

    pub fn transformer(&self) -> &FeatureTransformer {
        &self.transformer
    }

    pub fn classifier(&self) -> &GradientBoostedClassifier {
        &self.artifacts.classifier
    }

    /// Rank a batch as of today (UTC)
    pub fn rank(&self, records: &[RawVehicleRecord]) -> Result<RankingReport> {
        self.rank_at(records, Utc::now().date_naive())
    }

    /// Rank a batch, judging maintenance against `today`.
    ///
    /// Records that fail the pipeline are skipped and reported; a feature set
    /// disagreement between pipeline and model aborts the whole batch.
    pub fn rank_at(&self, records: &[RawVehicleRecord], today: NaiveDate) -> Result<RankingReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("rank", %run_id, records = records.len());
        let _enter = span.enter();
        let started = Instant::now();

        if let Err(e) = self.transformer.check_schema() {
            BATCHES_ABORTED_TOTAL.inc();
            error!(error = %e, "Model features cannot be produced by the pipeline, aborting batch");
            return Err(e.into());
        }

        let parallel = self.config.parallel && records.len() >= self.config.parallel_threshold;
        let outcomes: Vec<std::result::Result<PredictionResult, RecordError>> = if parallel {
            records
                .par_iter()
                .enumerate()
                .map(|(index, record)| self.evaluate(index, record, today))
                .collect()
        } else {
            records
                .iter()
                .enumerate()
                .map(|(index, record)| self.evaluate(index, record, today))
                .collect()
        };

        let mut results = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();

        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) if e.is_batch_fatal() => {
                    BATCHES_ABORTED_TOTAL.inc();
                    error!(index, error = %e, "Feature mismatch while scoring, aborting batch");
                    return Err(AppError::from(e));
                }
                Err(e) => {
                    let vehicle_id = vehicle_id_for(index, &records[index]);
                    warn!(
                        vehicle_id = %vehicle_id,
                        code = e.error_code(),
                        error = %e,
                        "Skipping vehicle record"
                    );
                    RECORDS_SKIPPED_TOTAL
                        .with_label_values(&[e.error_code()])
                        .inc();
                    skipped.push(SkippedRecord {
                        vehicle_id,
                        index,
                        code: e.error_code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        // Stable: equal urgency keeps input order
        results.sort_by(|a, b| b.urgency.total_cmp(&a.urgency));

        let elapsed = started.elapsed();
        RECORDS_SCORED_TOTAL.inc_by(results.len() as f64);
        RANKING_DURATION_SECONDS.observe(elapsed.as_secs_f64());

        info!(
            scored = results.len(),
            skipped = skipped.len(),
            parallel,
            elapsed_ms = elapsed.as_millis() as u64,
            "Ranking complete"
        );

        Ok(RankingReport {
            run_id,
            results,
            skipped,
            total_records: records.len(),
        })
    }

    /// Rank every record the store holds for `user_id`
    pub fn rank_for_user(&self, store: &dyn VehicleStore, user_id: &str) -> Result<RankingReport> {
        let records = store.records_for_user(user_id)?;
        info!(user_id, records = records.len(), "Ranking vehicles for user");
        self.rank(&records)
    }

    /// Score a single vehicle as of today (UTC)
    pub fn score_record(
        &self,
        record: &RawVehicleRecord,
    ) -> std::result::Result<PredictionResult, RecordError> {
        self.score_record_at(record, Utc::now().date_naive())
    }

    pub fn score_record_at(
        &self,
        record: &RawVehicleRecord,
        today: NaiveDate,
    ) -> std::result::Result<PredictionResult, RecordError> {
        self.transformer.check_schema()?;

        let outcome = self.evaluate(0, record, today);
        match &outcome {
            Ok(_) => RECORDS_SCORED_TOTAL.inc(),
            Err(e) => RECORDS_SKIPPED_TOTAL
                .with_label_values(&[e.error_code()])
                .inc(),
        }
        outcome
    }

    fn evaluate(
        &self,
        index: usize,
        record: &RawVehicleRecord,
        today: NaiveDate,
    ) -> std::result::Result<PredictionResult, RecordError> {
        let vector = self.transformer.transform(record)?;
        let score = self.artifacts.classifier.score(&vector)?;

        let classes = self.artifacts.classifier.classes();
        let last_serviced_date = record.last_serviced_date().and_then(parse_service_date);
        let maintenance_due = last_serviced_date
            .map(|date| date < today - Duration::days(self.config.maintenance_interval_days))
            .unwrap_or(false);

        Ok(PredictionResult {
            vehicle_id: vehicle_id_for(index, record),
            predicted_class: score.label,
            highest_failure: classes[score.label],
            probabilities: FailureProbabilities::from_ordered(classes, &score.probabilities),
            urgency: score.confidence,
            last_serviced_date,
            maintenance_due,
        })
    }
}

fn vehicle_id_for(index: usize, record: &RawVehicleRecord) -> String {
    record
        .vehicle_id()
        .unwrap_or_else(|| format!("record-{}", index))
}

/// `YYYY-MM-DD`, optionally followed by a time part
fn parse_service_date(raw: &str) -> Option<NaiveDate> {
    let date = raw.trim().split(['T', ' ']).next()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
