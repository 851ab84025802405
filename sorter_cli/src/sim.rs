//! Simulation backend wiring: hopper contents and test fault injection.

use sorter_core::calibration::{BackgroundModel, ChannelBounds};
use sorter_core::profile::{ChannelRange, ObjectProfile, ProfileTable};
use sorter_core::Stage;
use sorter_hardware::{HwError, SimPart};
use sorter_traits::{ColorSensor, HwResult, Rgb};

#[cfg_attr(feature = "hardware", allow(dead_code))]
/// Environment switch used by the CLI tests to make the simulated
/// upstream sensor fail (`sensor-timeout` or `sensor-fault`).
pub const FAULT_ENV: &str = "SORTER_SIM_FAULT";

/// Reading for one stage that the profile accepts and the background
/// does not: channel midpoints, with the first channel that can leave
/// the background range pushed out of it.
fn stage_color(ranges: &[ChannelRange; 3], bounds: ChannelBounds) -> Rgb {
    let mut rgb = [0i32; 3];
    for (ch, r) in ranges.iter().enumerate() {
        let mid = ((r.low + r.high) / 2.0).round() as i32;
        let (lo, hi) = (r.low.ceil() as i32, r.high.floor() as i32);
        rgb[ch] = if lo <= hi { mid.clamp(lo, hi) } else { mid };
    }
    if bounds.is_anomalous(Rgb(rgb)) {
        return Rgb(rgb);
    }
    for (ch, r) in ranges.iter().enumerate() {
        let below = bounds.low[ch] - 1;
        let above = bounds.high[ch] + 1;
        if (below as f32) >= r.low {
            rgb[ch] = below;
            break;
        }
        if (above as f32) <= r.high {
            rgb[ch] = above;
            break;
        }
    }
    Rgb(rgb)
}

pub fn part_for(profile: &ObjectProfile, background: &BackgroundModel) -> SimPart {
    let lengths = [0, 1].map(|s| (profile.length[s].low + profile.length[s].high) / 2);
    let colors = [
        stage_color(&profile.colors[0], background.bounds(Stage::Upstream)),
        stage_color(&profile.colors[1], background.bounds(Stage::Downstream)),
    ];
    SimPart {
        label: profile.name.clone(),
        lengths,
        colors,
    }
}

/// `count` parts cycling through the profile table in declared order.
pub fn hopper(profiles: &ProfileTable, background: &BackgroundModel, count: usize) -> Vec<SimPart> {
    let all: Vec<SimPart> = profiles.iter().map(|(_, p)| part_for(p, background)).collect();
    all.iter().cycle().take(count).cloned().collect()
}

/// Upstream sensor replacement selected through [`FAULT_ENV`].
#[cfg_attr(feature = "hardware", allow(dead_code))]
pub struct FailingSensor {
    timeout: bool,
}

#[cfg_attr(feature = "hardware", allow(dead_code))]
impl FailingSensor {
    pub fn from_env() -> Option<Self> {
        match std::env::var(FAULT_ENV).ok()?.as_str() {
            "sensor-timeout" => Some(Self { timeout: true }),
            "sensor-fault" => Some(Self { timeout: false }),
            _ => None,
        }
    }
}

impl ColorSensor for FailingSensor {
    fn rgb(&mut self) -> HwResult<Rgb> {
        if self.timeout {
            Err(Box::new(HwError::DataReadyTimeout))
        } else {
            Err(Box::new(HwError::I2c("simulated bus error".into())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorter_core::types::Features;

    #[test]
    fn every_builtin_profile_yields_a_detectable_part() {
        let bg = BackgroundModel::default();
        for (_, p) in ProfileTable::builtin().iter() {
            let part = part_for(p, &bg);
            assert!(bg.bounds(Stage::Upstream).is_anomalous(part.colors[0]), "{}", p.name);
            assert!(bg.bounds(Stage::Downstream).is_anomalous(part.colors[1]), "{}", p.name);
            let features = part.colors.map(|c| Features(c.0.map(|v| v as f32)));
            assert!(p.matches(part.lengths, features), "{} does not match itself", p.name);
        }
    }

    #[test]
    fn hopper_cycles_in_table_order() {
        let table = ProfileTable::builtin();
        let parts = hopper(&table, &BackgroundModel::default(), 16);
        assert_eq!(parts.len(), 16);
        assert_eq!(parts[0].label, "Black 2L");
        assert_eq!(parts[14].label, "Black 2L");
        assert_eq!(parts[15].label, "Black 3L");
    }
}
