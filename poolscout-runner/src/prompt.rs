//! Prompt construction from the reloaded pool table.
//!
//! The template is a fixed document with exactly one `{market_data}`
//! placeholder. The table rows are interpolated whole as pretty-printed JSON:
//! no truncation, no summarization, no size cap. Prompts above
//! [`LARGE_PROMPT_BYTES`] are logged as a warning and still sent whole.

use log::warn;
use poolscout_core::data::TableRow;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MARKET_DATA_PLACEHOLDER: &str = "{market_data}";

/// Soft size above which a prompt is reported as oversized.
pub const LARGE_PROMPT_BYTES: usize = 64 * 1024;

/// Built-in research-assistant template.
///
/// The wording assumes the default source (Solana, 5m window). Point
/// `[prompt] template_path` at a custom template for other networks or intervals.
pub const DEFAULT_TEMPLATE: &str = r#"
You are AbstrakT Strategy Research Assistant.

Below is the list of trending liquidity pools on the Solana network over the last 5 minutes:
{market_data}

Analyze the data and identify the single most promising pool to invest in.
This is an extremely volatile market, so weigh every decision carefully and
only commit when the evidence is strong.

The available balance is under 100 USD, so the choice must be low risk: favour
pools with high volume, a deep reserve, a moderate price change and a firm price.
These tokens are highly unpredictable; sentiment and further data will be added
in later sessions.

Your task:
1. Evaluate every variable in the data
2. Look for confirmation or contradiction between the different signals
3. Consider the risk factors

Report the following, then explain your reasoning:
    - Signal analysis
    - Market alignment
    - Risk assessment
    - Confidence in each decision (0-100%)
    - The pair name
    - The base token price
    - The volume
    - The reserve
    - The transactions
    - The price change percentage

Also explain how you calculate the stability index and the risk index, and give
an overall confidence percentage for the decision.

Remember:
- Risk management comes first
- Multiple confirming signals increase confidence
- Contradicting signals require deeper analysis
- It is better to reject a signal than to risk a bad trade
"#;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template must contain exactly one {{market_data}} placeholder, found {0}")]
    Placeholder(usize),

    #[error("failed to read template {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize market data: {0}")]
    Serialize(String),
}

/// A validated prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Accept `text` if it has exactly one `{market_data}` placeholder.
    pub fn new(text: impl Into<String>) -> Result<Self, PromptError> {
        let text = text.into();
        match text.matches(MARKET_DATA_PLACEHOLDER).count() {
            1 => Ok(Self { text }),
            n => Err(PromptError::Placeholder(n)),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, PromptError> {
        let text = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Substitute the market data into the template.
    pub fn render(&self, market_data: &[TableRow]) -> Result<String, PromptError> {
        let data = serde_json::to_string_pretty(market_data)
            .map_err(|e| PromptError::Serialize(e.to_string()))?;
        let prompt = self.text.replacen(MARKET_DATA_PLACEHOLDER, &data, 1);

        if prompt.len() > LARGE_PROMPT_BYTES {
            warn!(
                "Prompt is {} bytes ({} row(s)); sending it whole",
                prompt.len(),
                market_data.len()
            );
        }
        Ok(prompt)
    }
}

/// Render `template` with the reloaded table rows.
pub fn build_prompt(
    template: &PromptTemplate,
    market_data: &[TableRow],
) -> Result<String, PromptError> {
    template.render(market_data)
}
