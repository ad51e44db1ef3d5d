pub mod prediction_queries;
pub mod sent_alert_queries;
pub mod subscriber_queries;
