//! Autopilot setpoints and discrete vessel controls.

#![allow(missing_docs)]

use tracing::{debug, info};

use crate::connection::Session;
use crate::error::PilotError;
use crate::remote::{Attribute, RemoteCall, StreamTarget};
use crate::telemetry::{AutopilotTarget, TelemetrySnapshot};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutopilotTuning {
    pub rotation_speed_multiplier: f64,
    pub max_rotation_speed: f64,
}

impl Default for AutopilotTuning {
    fn default() -> Self {
        Self {
            rotation_speed_multiplier: 10.0,
            max_rotation_speed: 10.0,
        }
    }
}

/// Operator-only switches; there is no second writer to reconcile with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscreteControls {
    pub lights: bool,
    pub gear: bool,
    pub brakes: bool,
}

impl Default for DiscreteControls {
    fn default() -> Self {
        Self {
            lights: false,
            gear: true,
            brakes: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutopilotDispatcher {
    target: AutopilotTarget,
    controls: DiscreteControls,
    tuning: AutopilotTuning,
}

impl AutopilotDispatcher {
    #[must_use]
    pub fn new(tuning: AutopilotTuning) -> Self {
        Self {
            tuning,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn target(&self) -> AutopilotTarget {
        self.target
    }

    #[must_use]
    pub fn controls(&self) -> DiscreteControls {
        self.controls
    }

    /// Seeds targets and switches from the live vessel after a connect.
    ///
    /// Targets take the current attitude truncated to whole degrees and are
    /// written to the remote autopilot right away, so engaging later holds
    /// the present attitude instead of swinging to a default.
    pub fn initialize(
        &mut self,
        session: &mut Session,
        attitude: &TelemetrySnapshot,
    ) -> Result<(), PilotError> {
        session.call(RemoteCall::RotationSpeedMultiplier {
            value: self.tuning.rotation_speed_multiplier,
        })?;
        session.call(RemoteCall::MaxRotationSpeed {
            value: self.tuning.max_rotation_speed,
        })?;
        self.target = AutopilotTarget {
            heading: normalize_heading(attitude.heading.trunc()),
            pitch: attitude.pitch.trunc().clamp(-90.0, 90.0),
            roll: normalize_roll(attitude.roll.trunc()),
            engaged: false,
        };
        self.push_pitch_and_heading(session)?;
        session.call(RemoteCall::TargetRoll {
            roll: self.target.roll,
        })?;

        let vessel = session.vessel();
        let control = |attribute| StreamTarget::Control { vessel, attribute };
        self.controls = DiscreteControls {
            lights: session.get_bool(control(Attribute::Lights))?,
            gear: session.get_bool(control(Attribute::Gear))?,
            brakes: session.get_bool(control(Attribute::Brakes))?,
        };
        info!(
            heading = self.target.heading,
            pitch = self.target.pitch,
            roll = self.target.roll,
            "autopilot targets initialized from live attitude"
        );
        Ok(())
    }

    pub fn set_target_heading(
        &mut self,
        session: &mut Session,
        heading: f64,
    ) -> Result<(), PilotError> {
        self.target.heading = normalize_heading(finite("heading", heading)?);
        self.push_pitch_and_heading(session)
    }

    pub fn set_target_pitch(&mut self, session: &mut Session, pitch: f64) -> Result<(), PilotError> {
        self.target.pitch = finite("pitch", pitch)?.clamp(-90.0, 90.0);
        self.push_pitch_and_heading(session)
    }

    /// Roll is not part of the joint attitude command and travels alone.
    pub fn set_target_roll(&mut self, session: &mut Session, roll: f64) -> Result<(), PilotError> {
        self.target.roll = normalize_roll(finite("roll", roll)?);
        session.call(RemoteCall::TargetRoll {
            roll: self.target.roll,
        })
    }

    /// Engaging an engaged autopilot is a no-op. Disengaging always
    /// restores stability assist, whatever the previous state.
    pub fn set_engaged(&mut self, session: &mut Session, engaged: bool) -> Result<(), PilotError> {
        if engaged {
            if self.target.engaged {
                return Ok(());
            }
            session.call(RemoteCall::Engage)?;
            self.target.engaged = true;
            info!("autopilot engaged");
        } else {
            self.target.engaged = false;
            session.call(RemoteCall::Disengage)?;
            session.call(RemoteCall::SetSas { on: true })?;
            info!("autopilot disengaged, stability assist on");
        }
        Ok(())
    }

    pub fn set_lights(&mut self, session: &mut Session, on: bool) -> Result<(), PilotError> {
        self.controls.lights = on;
        session.call(RemoteCall::SetLights { on })
    }

    pub fn set_gear(&mut self, session: &mut Session, down: bool) -> Result<(), PilotError> {
        self.controls.gear = down;
        session.call(RemoteCall::SetGear { down })
    }

    pub fn set_brakes(&mut self, session: &mut Session, on: bool) -> Result<(), PilotError> {
        self.controls.brakes = on;
        session.call(RemoteCall::SetBrakes { on })
    }

    fn push_pitch_and_heading(&self, session: &mut Session) -> Result<(), PilotError> {
        debug!(
            pitch = self.target.pitch,
            heading = self.target.heading,
            "target pitch and heading"
        );
        session.call(RemoteCall::TargetPitchAndHeading {
            pitch: self.target.pitch,
            heading: self.target.heading,
        })
    }
}

fn finite(name: &str, value: f64) -> Result<f64, PilotError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PilotError::InvalidSetpoint(
            format!("{name} {value} is not a number").into(),
        ))
    }
}

fn normalize_heading(heading: f64) -> f64 {
    let heading = heading.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if heading >= 360.0 {
        0.0
    } else {
        heading
    }
}

fn normalize_roll(roll: f64) -> f64 {
    (roll + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionManager;
    use crate::harness::SimulatedRemote;

    fn connected() -> (SimulatedRemote, ConnectionManager<SimulatedRemote>) {
        let remote = SimulatedRemote::new();
        let mut manager = ConnectionManager::new(remote.clone(), "test");
        manager.connect("127.0.0.1", 50000, 50001).expect("connect");
        (remote, manager)
    }

    #[test]
    fn heading_and_pitch_preserve_each_other() {
        let (remote, mut manager) = connected();
        let session = manager.session_mut().expect("session");
        let mut dispatcher = AutopilotDispatcher::default();

        dispatcher.set_target_pitch(session, 12.0).expect("pitch");
        dispatcher.set_target_heading(session, 270.0).expect("heading");
        dispatcher.set_target_pitch(session, -5.0).expect("pitch");

        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::TargetPitchAndHeading {
                    pitch: 12.0,
                    heading: 90.0
                },
                RemoteCall::TargetPitchAndHeading {
                    pitch: 12.0,
                    heading: 270.0
                },
                RemoteCall::TargetPitchAndHeading {
                    pitch: -5.0,
                    heading: 270.0
                },
            ]
        );
    }

    #[test]
    fn roll_is_written_independently() {
        let (remote, mut manager) = connected();
        let session = manager.session_mut().expect("session");
        let mut dispatcher = AutopilotDispatcher::default();
        dispatcher.set_target_roll(session, 190.0).expect("roll");
        assert_eq!(remote.calls(), vec![RemoteCall::TargetRoll { roll: -170.0 }]);
        assert_eq!(dispatcher.target().heading, 90.0);
    }

    #[test]
    fn setpoints_are_normalized() {
        assert_eq!(normalize_heading(-90.0), 270.0);
        assert_eq!(normalize_heading(720.0), 0.0);
        assert_eq!(normalize_roll(180.0), -180.0);
        assert_eq!(normalize_roll(-45.0), -45.0);
    }

    #[test]
    fn disengage_restores_stability_assist_from_any_state() {
        let (remote, mut manager) = connected();
        let session = manager.session_mut().expect("session");
        let mut dispatcher = AutopilotDispatcher::default();

        dispatcher.set_engaged(session, false).expect("disengage idle");
        dispatcher.set_engaged(session, true).expect("engage");
        dispatcher.set_engaged(session, true).expect("engage twice");
        dispatcher.set_engaged(session, false).expect("disengage");

        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::Disengage,
                RemoteCall::SetSas { on: true },
                RemoteCall::Engage,
                RemoteCall::Disengage,
                RemoteCall::SetSas { on: true },
            ]
        );
        assert!(remote.vessel().sas);
    }

    #[test]
    fn initialize_uses_truncated_live_attitude() {
        let (remote, mut manager) = connected();
        remote.update_vessel(|vessel| {
            vessel.lights = true;
            vessel.gear = false;
        });
        let session = manager.session_mut().expect("session");
        let mut dispatcher = AutopilotDispatcher::new(AutopilotTuning::default());
        let attitude = TelemetrySnapshot {
            heading: 123.9,
            pitch: -4.6,
            roll: 2.2,
            ..TelemetrySnapshot::default()
        };
        dispatcher.initialize(session, &attitude).expect("initialize");

        let target = dispatcher.target();
        assert_eq!((target.heading, target.pitch, target.roll), (123.0, -4.0, 2.0));
        assert!(!target.engaged);
        assert_eq!(
            dispatcher.controls(),
            DiscreteControls {
                lights: true,
                gear: false,
                brakes: true,
            }
        );
        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::RotationSpeedMultiplier { value: 10.0 },
                RemoteCall::MaxRotationSpeed { value: 10.0 },
                RemoteCall::TargetPitchAndHeading {
                    pitch: -4.0,
                    heading: 123.0
                },
                RemoteCall::TargetRoll { roll: 2.0 },
            ]
        );
    }

    #[test]
    fn discrete_controls_write_through() {
        let (remote, mut manager) = connected();
        let session = manager.session_mut().expect("session");
        let mut dispatcher = AutopilotDispatcher::default();
        dispatcher.set_lights(session, true).expect("lights");
        dispatcher.set_gear(session, false).expect("gear");
        dispatcher.set_brakes(session, true).expect("brakes");
        let vessel = remote.vessel();
        assert!(vessel.lights && !vessel.gear && vessel.brakes);
        assert!(dispatcher.controls().lights);
    }

    #[test]
    fn non_finite_setpoints_are_rejected_before_any_call() {
        let (remote, mut manager) = connected();
        let session = manager.session_mut().expect("session");
        let mut dispatcher = AutopilotDispatcher::default();
        assert!(dispatcher.set_target_heading(session, f64::NAN).is_err());
        assert!(dispatcher.set_target_pitch(session, f64::INFINITY).is_err());
        assert!(remote.calls().is_empty());
    }
}
