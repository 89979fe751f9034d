/// Gameplay tuning for army growth.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).

#[derive(Debug, Clone, Copy)]
pub struct ArmyTuning {
    /// Plain owned tiles gain one army every `growth_period` turns.
    pub growth_period: u64,

    /// Armies added to generals and cities every turn.
    pub structure_growth: u32,

    /// Armies added to plain owned tiles on growth turns.
    pub territory_growth: u32,
}

impl Default for ArmyTuning {
    fn default() -> Self {
        Self {
            growth_period: 25,
            structure_growth: 1,
            territory_growth: 1,
        }
    }
}
