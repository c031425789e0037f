// src/sim.rs
// Software stand-in for the two motor controllers so the bench binary
// and end-to-end tests run without hardware. Not a plant model; just
// plausible telemetry that honors the rig's sign conventions (generator
// input current goes negative when it charges the battery).

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use crate::channel::Role;
use crate::controller::{Measurements, MotorController};
use crate::error::RigResult;

const POLE_PAIRS: f64 = 7.0;
const BATTERY_VOLTS_NOMINAL: f64 = 39.0;

/// Shared mechanical/electrical state of the coupled rig.
#[derive(Debug, Default)]
struct RigState {
    erpm: f64,
    target_erpm: f64,
    drive_current: f64,
    current_mode: bool,
    brake_current: f64,
    fet_temp: f64,
    motor_temp: f64,
}

impl RigState {
    /// Advances the rig one polling step: first-order RPM response toward
    /// the load-adjusted operating point, plus slow temperature drift.
    fn tick(&mut self) {
        let goal = if self.current_mode {
            (self.drive_current * 2000.0 - self.brake_current * 700.0).max(0.0)
        } else {
            (self.target_erpm - self.brake_current * 150.0).max(0.0)
        };
        self.erpm += (goal - self.erpm) * 0.2;

        let load_watts = self.brake_current * self.battery_volts();
        self.fet_temp = (self.fet_temp + load_watts * 0.0004).min(90.0);
        self.motor_temp = (self.motor_temp + load_watts * 0.0002).min(90.0);
    }

    fn driver_amps(&self) -> f64 {
        0.5 + self.brake_current * 0.9 + self.erpm * 1e-4
    }

    /// Battery sags under the driver's draw.
    fn battery_volts(&self) -> f64 {
        BATTERY_VOLTS_NOMINAL - 0.06 * self.driver_amps()
    }

    /// Charging, so negative as seen from the battery.
    fn generator_amps(&self) -> f64 {
        -(self.brake_current * 0.85)
    }
}

/// One controller handle onto the shared rig.
pub struct SimMotor {
    rig: Rc<RefCell<RigState>>,
    role: Role,
}

/// Builds a connected driver/generator pair sharing one mechanical state.
pub fn sim_rig() -> (SimMotor, SimMotor) {
    let rig = Rc::new(RefCell::new(RigState::default()));
    (
        SimMotor {
            rig: rig.clone(),
            role: Role::Driver,
        },
        SimMotor {
            rig,
            role: Role::Generator,
        },
    )
}

impl MotorController for SimMotor {
    fn get_measurements(&mut self) -> RigResult<Measurements> {
        // A serial transaction on the real rig blocks for a few ms.
        thread::sleep(Duration::from_millis(2));
        let mut rig = self.rig.borrow_mut();
        rig.tick();
        Ok(match self.role {
            Role::Driver => Measurements {
                rpm: rig.erpm,
                v_in: rig.battery_volts(),
                avg_input_current: rig.driver_amps(),
                temp_fet: rig.fet_temp,
                temp_motor: rig.motor_temp,
                fault_code: 0,
            },
            Role::Generator => Measurements {
                rpm: rig.erpm,
                v_in: rig.battery_volts(),
                avg_input_current: rig.generator_amps(),
                temp_fet: rig.fet_temp * 0.8,
                temp_motor: rig.motor_temp * 0.8,
                fault_code: 0,
            },
        })
    }

    fn get_rpm(&mut self) -> RigResult<f64> {
        thread::sleep(Duration::from_millis(1));
        let mut rig = self.rig.borrow_mut();
        rig.tick();
        Ok(rig.erpm)
    }

    fn set_rpm(&mut self, rpm: f64) -> RigResult<()> {
        let mut rig = self.rig.borrow_mut();
        rig.target_erpm = rpm;
        rig.current_mode = false;
        Ok(())
    }

    fn set_current(&mut self, amps: f64) -> RigResult<()> {
        let mut rig = self.rig.borrow_mut();
        rig.drive_current = amps;
        rig.current_mode = true;
        Ok(())
    }

    fn set_brake_current(&mut self, amps: f64) -> RigResult<()> {
        self.rig.borrow_mut().brake_current = amps.max(0.0);
        Ok(())
    }

    fn stop_heartbeat(&mut self) {}

    fn pole_pairs(&self) -> f64 {
        POLE_PAIRS
    }
}

// src/sim.rs
