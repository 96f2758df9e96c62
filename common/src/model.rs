use crate::types::RelayBits;

const START_TEMP_F: f32 = 78.0;
const AMBIENT_TEMP_F: f32 = 84.0;
const AMBIENT_DRIFT_F: f32 = 0.1;
const COOLING_RATE_F: f32 = 0.3;
const HEATING_RATE_F: f32 = 0.3;

pub fn celsius_to_fahrenheit(temp_c: f32) -> f32 {
    temp_c * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(temp_f: f32) -> f32 {
    (temp_f - 32.0) * 5.0 / 9.0
}

#[derive(Debug, Clone)]
pub struct TemperatureModel {
    temp_f: f32,
}

impl Default for TemperatureModel {
    fn default() -> Self {
        Self::new(START_TEMP_F)
    }
}

impl TemperatureModel {
    pub fn new(temp_f: f32) -> Self {
        Self { temp_f }
    }

    pub fn temp_f(&self) -> f32 {
        self.temp_f
    }

    pub fn sample(&mut self, relays: RelayBits) -> f32 {
        let toward_ambient = AMBIENT_TEMP_F - self.temp_f;
        self.temp_f += toward_ambient.clamp(-AMBIENT_DRIFT_F, AMBIENT_DRIFT_F);
        if relays.master_active() {
            if relays.cool_active() {
                self.temp_f -= COOLING_RATE_F;
            }
            if relays.heat_active() {
                self.temp_f += HEATING_RATE_F;
            }
        }
        fahrenheit_to_celsius(self.temp_f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Relay;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn idle_room_warms_slowly() {
        let mut model = TemperatureModel::default();

        let temp_c = model.sample(RelayBits::ALL_OFF);

        assert!(close(model.temp_f(), 78.1));
        assert!(close(celsius_to_fahrenheit(temp_c), 78.1));
    }

    #[test]
    fn cooling_outpaces_drift() {
        let mut model = TemperatureModel::default();
        let cooling = RelayBits::ALL_OFF
            .with(Relay::Fan, true)
            .with(Relay::Cool, true)
            .with(Relay::Master, true);

        for _ in 0..10 {
            model.sample(cooling);
        }

        assert!(close(model.temp_f(), 76.0));
    }

    #[test]
    fn appliances_need_master_power() {
        let mut model = TemperatureModel::new(65.0);
        let unpowered = RelayBits::ALL_OFF.with(Relay::Heat, true);

        model.sample(unpowered);

        assert!(close(model.temp_f(), 65.1));
    }

    #[test]
    fn idle_room_settles_inside_the_sensor_band() {
        let mut model = TemperatureModel::default();

        for _ in 0..10_000 {
            model.sample(RelayBits::ALL_OFF);
        }
        assert!(close(model.temp_f(), 84.0));

        let mut cold = TemperatureModel::new(62.0);
        cold.sample(RelayBits::ALL_OFF);
        assert!(close(cold.temp_f(), 62.1));
    }

    #[test]
    fn unit_conversion() {
        assert!(close(celsius_to_fahrenheit(22.0), 71.6));
        assert!(close(fahrenheit_to_celsius(212.0), 100.0));
    }
}
