//! Server power models.
//!
//! A power model maps instantaneous utilization in `[0, 1]` to watts.
//! Peak efficiency is derived from the model by scanning integer
//! utilization percents, so any model automatically exposes the
//! utilization level at which it does the most work per watt.

use dyn_clone::{clone_trait_object, DynClone};
use log::warn;

/// Number of entries in a dense utilization-indexed power table (0%..=100%).
pub const POWER_TABLE_LEN: usize = 101;

/// Maps server utilization to power draw.
pub trait ServerPowerModel: DynClone {
    /// Power draw in watts at the given utilization in `[0, 1]`.
    fn power(&self, utilization: f64) -> f64;

    /// Utilization maximizing work per watt, scanned at integer percents.
    fn peak_efficiency_utilization(&self) -> f64 {
        self.peak_efficiency_scan().0
    }

    /// Best work-per-watt ratio over the scanned utilization levels.
    fn peak_efficiency(&self) -> f64 {
        self.peak_efficiency_scan().1
    }

    /// Returns (utilization, efficiency) of the most efficient operating point.
    fn peak_efficiency_scan(&self) -> (f64, f64) {
        let mut best_util = 0.;
        let mut best_eff = 0.;
        for i in 1..POWER_TABLE_LEN {
            let util = i as f64 / 100.;
            let watts = self.power(util);
            if watts <= 0. {
                continue;
            }
            let eff = util / watts;
            if eff > best_eff {
                best_eff = eff;
                best_util = util;
            }
        }
        (best_util, best_eff)
    }
}

clone_trait_object!(ServerPowerModel);

/// Power grows linearly from idle draw to peak draw.
#[derive(Clone, Debug)]
pub struct LinearPowerModel {
    idle_power: f64,
    max_power: f64,
}

impl LinearPowerModel {
    pub fn new(idle_power: f64, max_power: f64) -> Self {
        assert!(idle_power >= 0. && max_power >= idle_power);
        Self { idle_power, max_power }
    }

    /// Builds the model from per-component draws: each socket contributes
    /// `socket_active_power` watts when powered, each busy core adds
    /// `core_active_power` watts, and `fixed_power` covers the rest of the
    /// chassis (fans, disks, NICs).
    pub fn from_components(
        sockets: u32,
        cores_per_socket: u32,
        socket_active_power: f64,
        core_active_power: f64,
        fixed_power: f64,
    ) -> Self {
        let idle = fixed_power + sockets as f64 * socket_active_power;
        let max = idle + (sockets * cores_per_socket) as f64 * core_active_power;
        Self::new(idle, max)
    }
}

impl ServerPowerModel for LinearPowerModel {
    fn power(&self, utilization: f64) -> f64 {
        self.idle_power + (self.max_power - self.idle_power) * utilization.clamp(0., 1.)
    }
}

/// Measured power curve given as a dense table indexed by utilization percent.
///
/// Lookup rounds the utilization up to the next whole percent, so any
/// nonzero load is charged at least the 1% figure.
#[derive(Clone, Debug)]
pub struct UtilizationTablePowerModel {
    table: Vec<f64>,
}

impl UtilizationTablePowerModel {
    /// The table must hold exactly [`POWER_TABLE_LEN`] entries,
    /// watts at 0%, 1%, ..., 100% utilization.
    pub fn new(table: Vec<f64>) -> Self {
        assert_eq!(
            table.len(),
            POWER_TABLE_LEN,
            "power table must cover every utilization percent"
        );
        Self { table }
    }
}

impl ServerPowerModel for UtilizationTablePowerModel {
    fn power(&self, utilization: f64) -> f64 {
        if !(0. ..=1.).contains(&utilization) {
            warn!("utilization {} outside [0, 1], clamping", utilization);
        }
        let idx = (utilization.clamp(0., 1.) * 100.).ceil() as usize;
        self.table[idx.min(POWER_TABLE_LEN - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_endpoints() {
        let model = LinearPowerModel::new(100., 300.);
        assert_eq!(model.power(0.), 100.);
        assert_eq!(model.power(0.5), 200.);
        assert_eq!(model.power(1.), 300.);
    }

    #[test]
    fn linear_peak_efficiency_is_full_load() {
        // With positive idle power, work per watt keeps improving with load.
        let model = LinearPowerModel::new(100., 300.);
        assert_eq!(model.peak_efficiency_utilization(), 1.);
    }

    #[test]
    fn component_derived_linear_model() {
        // 2 sockets at 10 W, 4 W per busy core (2x4 cores), 5 W fixed:
        // idle 25 W, peak 25 + 8 * 4 = 57 W.
        let model = LinearPowerModel::from_components(2, 4, 10., 4., 5.);
        assert_eq!(model.power(0.), 25.);
        assert_eq!(model.power(1.), 57.);
    }

    #[test]
    fn table_rounds_utilization_up() {
        let mut table = vec![0.; POWER_TABLE_LEN];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = i as f64;
        }
        let model = UtilizationTablePowerModel::new(table);
        assert_eq!(model.power(0.), 0.);
        assert_eq!(model.power(0.001), 1.);
        assert_eq!(model.power(0.504), 51.);
        assert_eq!(model.power(1.), 100.);
    }

    #[test]
    fn table_peak_efficiency_finds_interior_point() {
        // Flat 100 W everywhere except a dip to 10 W at 40%.
        let mut table = vec![100.; POWER_TABLE_LEN];
        table[40] = 10.;
        let model = UtilizationTablePowerModel::new(table);
        assert_eq!(model.peak_efficiency_utilization(), 0.4);
        assert!((model.peak_efficiency() - 0.04).abs() < 1e-12);
    }
}
