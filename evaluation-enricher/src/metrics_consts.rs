// Storage reads
pub const EVALUATIONS_FETCHED_COUNTER: &str = "enricher_evaluations_fetched_total";
pub const MESSAGE_LOOKUPS_COUNTER: &str = "enricher_message_lookups_total";
pub const MESSAGE_LOOKUPS_SKIPPED_COUNTER: &str = "enricher_message_lookups_skipped_total";
pub const MESSAGE_LOOKUP_ERRORS_COUNTER: &str = "enricher_message_lookup_errors_total";
pub const MESSAGES_FETCHED_COUNTER: &str = "enricher_messages_fetched_total";

// Enrichment outcomes
pub const ENRICHED_EVALUATIONS_COUNTER: &str = "enricher_enriched_evaluations_total";

// Timing
pub const PIPELINE_RUN_TIME: &str = "enricher_pipeline_run_time";
pub const MESSAGE_LOOKUP_TIME: &str = "enricher_message_lookup_time";
