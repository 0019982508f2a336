/// Inflow estimate for a sump reading.
///
/// Rain inflow assumes the whole catchment drains into the sump:
/// 1 mm of rain over 1 ha is 10 m³. Groundwater/seepage inflow is whatever
/// the reading recorded (0 when absent). The two terms are kept apart so
/// classification can tell rain-driven excess from seepage-driven excess.

use crate::model::SumpReading;

/// Runoff volume from 1 mm of rain over 1 ha, in m³.
pub const RAIN_M3_PER_MM_HA: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inflow {
    pub rain_m3: f64,
    pub groundwater_m3: f64,
}

impl Inflow {
    pub fn total(&self) -> f64 {
        self.rain_m3 + self.groundwater_m3
    }
}

/// Rain runoff volume for `rain_mm` over `catchment_ha`.
pub fn rain_inflow_m3(rain_mm: f64, catchment_ha: f64) -> f64 {
    rain_mm * catchment_ha * RAIN_M3_PER_MM_HA
}

pub fn inflow_for(reading: &SumpReading) -> Inflow {
    Inflow {
        rain_m3: rain_inflow_m3(reading.rain_actual_mm, reading.catchment_ha),
        groundwater_m3: reading.groundwater_m3,
    }
}
