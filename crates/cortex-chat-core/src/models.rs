use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Cortex models offered in the model selector.
///
/// The service accepts any identifier; this list only drives the UI and the
/// `/api/models` endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum CortexModel {
    #[default]
    #[strum(serialize = "mistral-large")]
    MistralLarge,
    #[strum(serialize = "mixtral-8x7b")]
    Mixtral8x7b,
    #[strum(serialize = "llama3-8b")]
    Llama3_8b,
    #[strum(serialize = "llama3-70b")]
    Llama3_70b,
    #[strum(serialize = "snowflake-arctic")]
    SnowflakeArctic,
}

impl CortexModel {
    /// Identifiers of every supported model, in selector order.
    pub fn ids() -> Vec<String> {
        Self::iter().map(|m| m.to_string()).collect()
    }
}
