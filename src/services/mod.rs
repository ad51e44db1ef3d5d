pub mod analogy_service;
pub mod dataset;
pub mod digest;
pub mod evidence_service;
pub mod explainer_service;
pub mod feature_service;
pub mod hypothesis_service;
pub mod indicators;
pub mod job_scheduler_service;
pub mod llm_service;
pub mod market_context_service;
pub mod prediction_cache;
pub mod predictor_service;
pub mod sentiment_service;
pub mod synthesizer_service;
pub mod watcher_service;
