mod analogy;
mod explanation;
mod hypothesis;
mod prediction;
mod price_point;
mod sentiment;
mod subscriber;

pub use analogy::{AnalogyResult, Direction};
pub use explanation::{ConfidenceTier, Explanation};
pub use hypothesis::{
    BaseRates, CaseItem, HistoricalEvidence, HypothesisType, MarketContext, ParsedHypothesis,
    ResearchBrief,
};
pub use prediction::{ModelInfo, PredictionResponse, TopSignal};
pub use price_point::{PriceHistoryResponse, PricePoint};
pub use sentiment::{SentimentHistoryResponse, SentimentPoint, SentimentSnapshot};
pub use subscriber::{
    AccuracyStatsResponse, PredictionRecord, RegisterOutcome, RegisterSubscriber, SentAlert,
    Subscriber, TickerAccuracy, TickerAccuracyView,
};
