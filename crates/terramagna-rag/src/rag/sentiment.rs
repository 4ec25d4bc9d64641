//! Client mood, used to adjust the tone of the reply.

use serde::Serialize;
use vader_sentiment::SentimentIntensityAnalyzer;

/// VADER compound score at or beyond which a message counts as emotional.
const COMPOUND_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Frustrated,
    Positive,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Frustrated => "frustrated",
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
        }
    }
}

pub fn detect_sentiment(text: &str) -> Sentiment {
    let analyzer = SentimentIntensityAnalyzer::new();
    let compound = analyzer
        .polarity_scores(text)
        .get("compound")
        .copied()
        .unwrap_or(0.0);

    if compound <= -COMPOUND_THRESHOLD {
        Sentiment::Frustrated
    } else if compound >= COMPOUND_THRESHOLD {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    }
}
