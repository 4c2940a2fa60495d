// THEORY:
// The `registry` module is the single source of truth for which fault
// identifiers exist, which simulated cause they belong to, and what they do.
// It replaces string-keyed dispatch tables with a closed set of tagged
// variants so that every dispatch site is exhaustively checkable.
//
// Key architectural principles:
// 1.  **Closed Taxonomy**: `FaultKind` enumerates every registered fault.
//     Adding a fault means adding a variant, and the compiler then points at
//     every match that must learn about it.
// 2.  **Fail Fast**: `FaultKind::resolve` is the only way to turn an external
//     identifier into a fault. The orchestrator resolves the whole selection
//     before any work starts, so an unknown identifier can never surface
//     mid-batch.
// 3.  **Stable Enumeration**: `FaultCategory::ALL` and `FaultKind::ALL` fix a
//     canonical order. Category listings for UI population and the
//     orchestrator's unit ordering both derive from it.

use crate::error::GenerationError;

/// Grouping of faults by simulated cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FaultCategory {
    Emi,
    Environmental,
    Hardware,
    AiRelevant,
}

impl FaultCategory {
    /// Canonical iteration order for the whole taxonomy.
    pub const ALL: [FaultCategory; 4] = [
        FaultCategory::Emi,
        FaultCategory::Environmental,
        FaultCategory::Hardware,
        FaultCategory::AiRelevant,
    ];

    /// The label used in output filenames and metadata artifacts.
    pub fn label(self) -> &'static str {
        match self {
            FaultCategory::Emi => "EMI",
            FaultCategory::Environmental => "Environmental",
            FaultCategory::Hardware => "Hardware",
            FaultCategory::AiRelevant => "AI_Relevant",
        }
    }
}

/// One named image-degradation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    // EMI
    Flicker,
    ColorShift,
    Desaturation,
    RollingShutterSkew,
    SaltPepperNoise,
    // Environmental
    Blur,
    Brightness,
    Fog,
    Glare,
    Raindrop,
    LensDirt,
    // Hardware
    Blackout,
    FrameDrop,
    DeadPixels,
    HotPixels,
    LineDropout,
    // AI-Relevant
    TemporalLag,
    SpatialJitter,
    RandomPatchNoise,
    Warping,
}

impl FaultKind {
    /// Every registered fault, in canonical category order.
    pub const ALL: [FaultKind; 20] = [
        FaultKind::Flicker,
        FaultKind::ColorShift,
        FaultKind::Desaturation,
        FaultKind::RollingShutterSkew,
        FaultKind::SaltPepperNoise,
        FaultKind::Blur,
        FaultKind::Brightness,
        FaultKind::Fog,
        FaultKind::Glare,
        FaultKind::Raindrop,
        FaultKind::LensDirt,
        FaultKind::Blackout,
        FaultKind::FrameDrop,
        FaultKind::DeadPixels,
        FaultKind::HotPixels,
        FaultKind::LineDropout,
        FaultKind::TemporalLag,
        FaultKind::SpatialJitter,
        FaultKind::RandomPatchNoise,
        FaultKind::Warping,
    ];

    /// The external identifier used in selections, config files, and filenames.
    pub fn identifier(self) -> &'static str {
        match self {
            FaultKind::Flicker => "flicker",
            FaultKind::ColorShift => "color_shift",
            FaultKind::Desaturation => "desaturation",
            FaultKind::RollingShutterSkew => "rolling_shutter_skew",
            FaultKind::SaltPepperNoise => "salt_pepper_noise",
            FaultKind::Blur => "blur",
            FaultKind::Brightness => "brightness",
            FaultKind::Fog => "fog",
            FaultKind::Glare => "glare",
            FaultKind::Raindrop => "raindrop",
            FaultKind::LensDirt => "lens_dirt",
            FaultKind::Blackout => "blackout",
            FaultKind::FrameDrop => "frame_drop",
            FaultKind::DeadPixels => "dead_pixels",
            FaultKind::HotPixels => "hot_pixels",
            FaultKind::LineDropout => "line_dropout",
            FaultKind::TemporalLag => "temporal_lag",
            FaultKind::SpatialJitter => "spatial_jitter",
            FaultKind::RandomPatchNoise => "random_patch_noise",
            FaultKind::Warping => "warping",
        }
    }

    pub fn category(self) -> FaultCategory {
        match self {
            FaultKind::Flicker
            | FaultKind::ColorShift
            | FaultKind::Desaturation
            | FaultKind::RollingShutterSkew
            | FaultKind::SaltPepperNoise => FaultCategory::Emi,
            FaultKind::Blur
            | FaultKind::Brightness
            | FaultKind::Fog
            | FaultKind::Glare
            | FaultKind::Raindrop
            | FaultKind::LensDirt => FaultCategory::Environmental,
            FaultKind::Blackout
            | FaultKind::FrameDrop
            | FaultKind::DeadPixels
            | FaultKind::HotPixels
            | FaultKind::LineDropout => FaultCategory::Hardware,
            FaultKind::TemporalLag
            | FaultKind::SpatialJitter
            | FaultKind::RandomPatchNoise
            | FaultKind::Warping => FaultCategory::AiRelevant,
        }
    }

    /// Human description of the simulated cause, for UI population.
    pub fn description(self) -> &'static str {
        match self {
            FaultKind::Flicker => "Simulates EMI-induced flickering lines and dimming",
            FaultKind::ColorShift => "Color processing distortion due to interference",
            FaultKind::Desaturation => "Signal degradation causing loss of saturation",
            FaultKind::RollingShutterSkew => "Row-wise distortion typical of CMOS sensors",
            FaultKind::SaltPepperNoise => "Random black and white noise from EMI or ADC faults",
            FaultKind::Blur => "Simulates motion or defocus blur",
            FaultKind::Brightness => "Overexposure or brightness shifts",
            FaultKind::Fog => "Reduced visibility due to haze",
            FaultKind::Glare => "High-intensity light artifacts",
            FaultKind::Raindrop => "Water droplets on lens (not implemented)",
            FaultKind::LensDirt => "Static dirt on lens (not implemented)",
            FaultKind::Blackout => "Complete or partial frame loss",
            FaultKind::FrameDrop => "Simulates dropped or skipped frames",
            FaultKind::DeadPixels => "Black (stuck-off) sensor pixels",
            FaultKind::HotPixels => "Bright (stuck-on) sensor pixels",
            FaultKind::LineDropout => "Row/column failures from sensor readout issues",
            FaultKind::TemporalLag => "Repeats an old frame (not implemented, needs sequence memory)",
            FaultKind::SpatialJitter => "Pixel-level noise or motion shake",
            FaultKind::RandomPatchNoise => "Random occlusion patches",
            FaultKind::Warping => "Perspective or lens-induced distortion",
        }
    }

    /// Resolves an external identifier to its registered fault.
    pub fn resolve(identifier: &str) -> Result<FaultKind, GenerationError> {
        FaultKind::ALL
            .iter()
            .copied()
            .find(|fault| fault.identifier() == identifier)
            .ok_or_else(|| GenerationError::UnknownFault(identifier.to_string()))
    }

    /// Enumerates the taxonomy grouped by category, in canonical order.
    pub fn by_category() -> Vec<(FaultCategory, Vec<FaultKind>)> {
        FaultCategory::ALL
            .iter()
            .map(|&category| {
                let faults = FaultKind::ALL
                    .iter()
                    .copied()
                    .filter(|fault| fault.category() == category)
                    .collect();
                (category, faults)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_identifier_resolves_to_itself() {
        for fault in FaultKind::ALL {
            assert_eq!(FaultKind::resolve(fault.identifier()).unwrap(), fault);
        }
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let err = FaultKind::resolve("lens_flare").unwrap_err();
        assert!(matches!(err, GenerationError::UnknownFault(name) if name == "lens_flare"));
    }

    #[test]
    fn taxonomy_is_complete_and_grouped() {
        let grouped = FaultKind::by_category();
        assert_eq!(grouped.len(), 4);
        let counts: Vec<usize> = grouped.iter().map(|(_, faults)| faults.len()).collect();
        assert_eq!(counts, vec![5, 6, 5, 4]);
        let total: usize = counts.iter().sum();
        assert_eq!(total, FaultKind::ALL.len());
    }
}
