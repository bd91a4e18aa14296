//! End-to-end command scenarios for the switching actuators.

use labrig::app::events::{ModuleAddress, Scalar};
use labrig::app::module::{CommandKind, Dispatch, Module};
use labrig::app::ports::Clock;
use labrig::config::{BrakeParams, Parameters, ScreenParams, TtlParams, ValveParams};
use labrig::drivers::brake::{Brake, BrakeCommand, BrakeEvent, BrakeWiring};
use labrig::drivers::screen::{Screen, ScreenCommand, ScreenEvent};
use labrig::drivers::speaker::{Speaker, SpeakerCommand, SpeakerEvent, SpeakerWiring};
use labrig::drivers::ttl::{Ttl, TtlCommand, TtlEvent, TtlWiring};
use labrig::drivers::valve::{Valve, ValveCommand, ValveEvent, ValveWiring};
use labrig::error::{ConfigError, LayoutError};
use labrig::pins::{ACTOR_BRAKE, ACTOR_SCREEN, ACTOR_VALVE, PinRegistry};
use labrig::sequencer::{ExecState, Execution, Progress};

use crate::mock_hw::{Bench, MockInput, MockPin, MockPwm};

fn code(e: impl Into<u8>) -> u8 {
    e.into()
}

const PLAIN_VALVE: ValveWiring = ValveWiring {
    address: ModuleAddress::new(5, 1),
    pin: 29,
    normally_closed: true,
    start_closed: true,
    tone_pin: None,
};

fn valve_with(bench: &Bench, params: ValveParams) -> (Valve<MockPin>, MockPin) {
    let pin = bench.pin();
    let mut reg = PinRegistry::new();
    let mut valve = Valve::without_tone(&PLAIN_VALVE, pin.clone(), &mut reg).unwrap();
    valve.apply_parameters(&params.encode()).unwrap();
    (valve, pin)
}

// ── Valve ─────────────────────────────────────────────────────

#[test]
fn valve_pulse_holds_open_for_pulse_duration() {
    let mut bench = Bench::new();
    let (mut valve, pin) = valve_with(&bench, ValveParams::default());
    bench.setup(&mut valve);

    let params = ValveParams {
        pulse_duration: 35_000,
        ..ValveParams::default()
    };
    valve.apply_parameters(&params.encode()).unwrap();

    let done = bench.execute(&mut valve, code(ValveCommand::Pulse), 1_000);
    assert_eq!(done, Progress::Completed);
    assert_eq!(
        bench.sink.codes(),
        vec![
            code(ValveEvent::Closed),
            code(ValveEvent::Open),
            code(ValveEvent::Closed)
        ]
    );
    // Normally-closed valve: HIGH opens it.
    assert_eq!(pin.levels(), vec![false, true, false]);
    assert_eq!(pin.high_time(), 35_000);
    assert!(!valve.is_open());
}

#[test]
fn valve_pulse_does_not_block_between_ticks() {
    let mut bench = Bench::new();
    let (mut valve, pin) = valve_with(&bench, ValveParams::default());
    let mut exec = bench.start(code(ValveCommand::Pulse));

    assert_eq!(bench.tick(&mut valve, &mut exec), Dispatch::Handled(Progress::Running));
    assert!(valve.is_open());
    let writes = pin.writes().len();

    // Re-entry before the deadline touches nothing.
    bench.clock.advance(10_000);
    assert_eq!(bench.tick(&mut valve, &mut exec), Dispatch::Handled(Progress::Running));
    assert_eq!(pin.writes().len(), writes);
    assert_eq!(exec.stage(), 2);
}

#[test]
fn valve_pulse_with_tone_keeps_tone_for_tone_duration() {
    let mut bench = Bench::new();
    let (valve_pin, tone_pin) = (bench.pin(), bench.pin());
    let mut reg = PinRegistry::new();
    let mut valve =
        Valve::new(&ACTOR_VALVE, valve_pin.clone(), Some(tone_pin.clone()), &mut reg).unwrap();
    assert!(valve.has_tone());
    bench.setup(&mut valve);
    assert_eq!(
        bench.sink.codes(),
        vec![code(ValveEvent::ToneOff), code(ValveEvent::Closed)]
    );
    bench.sink.clear();

    let params = ValveParams {
        pulse_duration: 35_000,
        tone_duration: 300_000,
        ..ValveParams::default()
    };
    valve.apply_parameters(&params.encode()).unwrap();
    assert_eq!(
        bench.execute(&mut valve, code(ValveCommand::Pulse), 1_000),
        Progress::Completed
    );

    assert_eq!(
        bench.sink.codes(),
        vec![
            code(ValveEvent::Open),
            code(ValveEvent::ToneOn),
            code(ValveEvent::Closed),
            code(ValveEvent::ToneOff)
        ]
    );
    assert_eq!(valve_pin.high_time(), 35_000);
    assert_eq!(tone_pin.high_time(), 300_000);
}

#[test]
fn tone_shorter_than_pulse_ends_with_valve() {
    let mut bench = Bench::new();
    let (valve_pin, tone_pin) = (bench.pin(), bench.pin());
    let mut reg = PinRegistry::new();
    let mut valve =
        Valve::new(&ACTOR_VALVE, valve_pin.clone(), Some(tone_pin.clone()), &mut reg).unwrap();
    let params = ValveParams {
        pulse_duration: 50_000,
        tone_duration: 10_000,
        ..ValveParams::default()
    };
    valve.apply_parameters(&params.encode()).unwrap();

    bench.execute(&mut valve, code(ValveCommand::Pulse), 1_000);
    assert_eq!(valve_pin.high_time(), 50_000);
    assert_eq!(tone_pin.high_time(), 50_000);
}

#[test]
fn locked_output_refuses_pulse() {
    let mut bench = Bench::new();
    let (mut valve, pin) = valve_with(&bench, ValveParams::default());
    bench.setup(&mut valve);
    bench.sink.clear();
    bench.lock.engage();

    let mut exec = Execution::new();
    exec.start_recurrent(code(ValveCommand::Pulse), 5_000, 0);
    assert_eq!(bench.run_to_end(&mut valve, &mut exec, 1_000), Progress::Aborted);

    assert_eq!(bench.sink.codes(), vec![code(ValveEvent::OutputLocked)]);
    // Only the setup write reached the pin.
    assert_eq!(pin.levels(), vec![false]);
    assert_eq!(exec.recurrence_us(), None);
    assert_eq!(exec.state(), ExecState::Aborted);
}

#[test]
fn setup_writes_bypass_the_lock() {
    let mut bench = Bench::new();
    bench.lock.engage();
    let (mut valve, pin) = valve_with(&bench, ValveParams::default());
    bench.setup(&mut valve);
    assert_eq!(pin.levels(), vec![false]);
    assert_eq!(bench.sink.codes(), vec![code(ValveEvent::Closed)]);
}

#[test]
fn toggle_off_is_idempotent() {
    let mut bench = Bench::new();
    let (mut valve, pin) = valve_with(&bench, ValveParams::default());

    for _ in 0..2 {
        assert_eq!(
            bench.execute(&mut valve, code(ValveCommand::ToggleOff), 1_000),
            Progress::Completed
        );
    }
    assert_eq!(
        bench.sink.codes(),
        vec![code(ValveEvent::Closed), code(ValveEvent::Closed)]
    );
    assert_eq!(pin.levels(), vec![false, false]);

    bench.execute(&mut valve, code(ValveCommand::ToggleOn), 1_000);
    assert!(valve.is_open());
    assert_eq!(pin.level(), Some(true));
}

#[test]
fn calibrate_blocks_for_every_pulse() {
    let mut bench = Bench::new();
    let params = ValveParams {
        pulse_duration: 1_000,
        calibration_delay: 2_000,
        calibration_count: 3,
        ..ValveParams::default()
    };
    let (mut valve, pin) = valve_with(&bench, params);
    assert_eq!(
        valve.command_kind(code(ValveCommand::Calibrate)),
        Some(CommandKind::Blocking)
    );

    let mut exec = bench.start(code(ValveCommand::Calibrate));
    assert_eq!(
        bench.tick(&mut valve, &mut exec),
        Dispatch::Handled(Progress::Completed)
    );
    assert_eq!(pin.levels(), vec![true, false, true, false, true, false]);
    assert_eq!(pin.high_time(), 3_000);
    assert_eq!(bench.clock.now_us(), 9_000);
    assert_eq!(bench.sink.codes(), vec![code(ValveEvent::Calibrated)]);
}

#[test]
fn calibrate_aborts_when_locked() {
    let mut bench = Bench::new();
    let (mut valve, pin) = valve_with(&bench, ValveParams::default());
    bench.lock.engage();

    assert_eq!(
        bench.execute(&mut valve, code(ValveCommand::Calibrate), 1_000),
        Progress::Aborted
    );
    assert!(pin.writes().is_empty());
    assert_eq!(bench.sink.codes(), vec![code(ValveEvent::OutputLocked)]);
}

#[test]
fn tone_without_tone_line_reports_and_aborts() {
    let mut bench = Bench::new();
    let (mut valve, pin) = valve_with(&bench, ValveParams::default());

    assert_eq!(
        bench.execute(&mut valve, code(ValveCommand::Tone), 1_000),
        Progress::Aborted
    );
    assert_eq!(bench.sink.codes(), vec![code(ValveEvent::TonePinNotSet)]);
    assert!(pin.writes().is_empty());
}

#[test]
fn unknown_command_is_unhandled() {
    let mut bench = Bench::new();
    let (mut valve, pin) = valve_with(&bench, ValveParams::default());
    assert_eq!(valve.command_kind(9), None);

    let mut exec = bench.start(9);
    assert_eq!(bench.tick(&mut valve, &mut exec), Dispatch::Unhandled);
    assert!(pin.writes().is_empty());
    assert!(bench.sink.reports.is_empty());
}

#[test]
fn pin_fault_aborts_without_report() {
    let mut bench = Bench::new();
    let (mut valve, pin) = valve_with(&bench, ValveParams::default());
    pin.fail_writes(true);

    assert_eq!(
        bench.execute(&mut valve, code(ValveCommand::Pulse), 1_000),
        Progress::Aborted
    );
    assert!(bench.sink.reports.is_empty());
}

#[test]
fn wrong_length_parameters_are_rejected() {
    let bench = Bench::new();
    let (mut valve, _) = valve_with(&bench, ValveParams::default());
    let err = valve.apply_parameters(&[1, 2, 3]).unwrap_err();
    assert_eq!(
        err,
        ConfigError::WrongLength {
            expected: 14,
            actual: 3
        }
    );
    assert_eq!(*valve.parameters(), ValveParams::default());
}

#[test]
fn setup_restores_default_parameters() {
    let mut bench = Bench::new();
    let params = ValveParams {
        pulse_duration: 1,
        ..ValveParams::default()
    };
    let (mut valve, _) = valve_with(&bench, params);
    assert_eq!(valve.parameters().pulse_duration, 1);
    bench.setup(&mut valve);
    assert_eq!(*valve.parameters(), ValveParams::default());
}

#[test]
fn duplicate_pin_is_rejected_at_construction() {
    let bench = Bench::new();
    let mut reg = PinRegistry::new();
    reg.claim(29).unwrap();
    let err = Valve::without_tone(&PLAIN_VALVE, bench.pin(), &mut reg).err();
    assert_eq!(err, Some(LayoutError::DuplicatePin(29)));
}

#[test]
fn tone_wiring_must_match_the_tone_line() {
    let bench = Bench::new();
    let err = Valve::<MockPin, MockPin>::new(&ACTOR_VALVE, bench.pin(), None, &mut PinRegistry::new())
        .err();
    assert_eq!(err, Some(LayoutError::MissingLine(9)));

    let err = Valve::new(&PLAIN_VALVE, bench.pin(), Some(bench.pin()), &mut PinRegistry::new())
        .err();
    assert_eq!(err, Some(LayoutError::UndeclaredLine));
}

#[test]
fn failed_tone_does_not_strand_the_valve_open() {
    let mut bench = Bench::new();
    let (valve_pin, tone_pin) = (bench.pin(), bench.pin());
    let mut reg = PinRegistry::new();
    let mut valve =
        Valve::new(&ACTOR_VALVE, valve_pin.clone(), Some(tone_pin.clone()), &mut reg).unwrap();
    tone_pin.fail_writes(true);

    assert_eq!(
        bench.execute(&mut valve, code(ValveCommand::Pulse), 1_000),
        Progress::Aborted
    );
    assert_eq!(valve_pin.levels(), vec![true, false]);
    assert_eq!(valve_pin.high_time(), u64::from(ValveParams::default().pulse_duration));
    assert!(!valve.is_open());
    assert_eq!(
        bench.sink.codes(),
        vec![code(ValveEvent::Open), code(ValveEvent::Closed)]
    );
}

// ── TTL ───────────────────────────────────────────────────────

const TTL: TtlWiring = TtlWiring {
    address: ModuleAddress::new(1, 1),
    pin: 34,
};

#[test]
fn ttl_output_pulse() {
    let mut bench = Bench::new();
    let pin = bench.pin();
    let mut ttl = Ttl::output(&TTL, pin.clone(), false, &mut PinRegistry::new()).unwrap();
    bench.setup(&mut ttl);
    assert!(bench.sink.reports.is_empty());

    let params = TtlParams {
        pulse_duration: 5_000,
        ..TtlParams::default()
    };
    ttl.apply_parameters(&params.encode()).unwrap();
    assert_eq!(
        bench.execute(&mut ttl, code(TtlCommand::Pulse), 500),
        Progress::Completed
    );
    assert_eq!(pin.levels(), vec![false, true, false]);
    assert_eq!(pin.high_time(), 5_000);
    assert_eq!(
        bench.sink.codes(),
        vec![code(TtlEvent::OutputOn), code(TtlEvent::OutputOff)]
    );
}

#[test]
fn ttl_input_rejects_output_commands() {
    let mut bench = Bench::new();
    let input = MockInput::constant(true);
    let mut ttl = Ttl::input(&TTL, input.clone(), &mut PinRegistry::new()).unwrap();
    assert!(!ttl.is_output());

    for cmd in [TtlCommand::Pulse, TtlCommand::ToggleOn, TtlCommand::ToggleOff] {
        assert_eq!(bench.execute(&mut ttl, code(cmd), 1_000), Progress::Aborted);
    }
    assert_eq!(bench.sink.codes(), vec![code(TtlEvent::InvalidPinMode); 3]);
    assert_eq!(input.reads(), 0);
}

#[test]
fn ttl_output_rejects_check_state() {
    let mut bench = Bench::new();
    let pin = bench.pin();
    let mut ttl = Ttl::output(&TTL, pin.clone(), false, &mut PinRegistry::new()).unwrap();
    assert_eq!(
        bench.execute(&mut ttl, code(TtlCommand::CheckState), 1_000),
        Progress::Aborted
    );
    assert_eq!(bench.sink.codes(), vec![code(TtlEvent::InvalidPinMode)]);
    assert!(pin.writes().is_empty());
}

#[test]
fn ttl_input_reports_only_changes() {
    let mut bench = Bench::new();
    let input = MockInput::constant(false);
    input.push(&[false, true, true, false]);
    let mut ttl = Ttl::input(&TTL, input, &mut PinRegistry::new()).unwrap();
    bench.setup(&mut ttl);

    for _ in 0..4 {
        bench.execute(&mut ttl, code(TtlCommand::CheckState), 1_000);
    }
    assert_eq!(
        bench.sink.codes(),
        vec![code(TtlEvent::InputOn), code(TtlEvent::InputOff)]
    );
}

// ── Brake ─────────────────────────────────────────────────────

#[test]
fn brake_setup_and_toggle() {
    let mut bench = Bench::new();
    let pwm = MockPwm::default();
    let mut brake = Brake::new(&ACTOR_BRAKE, pwm.clone(), &mut PinRegistry::new()).unwrap();
    bench.setup(&mut brake);
    // Normally disengaged: engaging means powering the coil.
    assert_eq!(pwm.duty(), Some(255));
    assert_eq!(bench.sink.codes(), vec![code(BrakeEvent::Engaged)]);

    bench.execute(&mut brake, code(BrakeCommand::ToggleOff), 1_000);
    assert_eq!(pwm.duty(), Some(0));
    assert_eq!(bench.sink.codes().last(), Some(&code(BrakeEvent::Disengaged)));
}

#[test]
fn brake_power_reports_strength() {
    let mut bench = Bench::new();
    let pwm = MockPwm::default();
    let mut brake = Brake::new(&ACTOR_BRAKE, pwm.clone(), &mut PinRegistry::new()).unwrap();

    bench.execute(&mut brake, code(BrakeCommand::SetBreakingPower), 1_000);
    assert_eq!(pwm.duty(), Some(128));
    let (_, report) = bench.sink.reports.last().unwrap();
    assert_eq!(report.code, code(BrakeEvent::PowerSet));
    assert_eq!(report.value(), Some(Scalar::U8(128)));
}

#[test]
fn normally_engaged_brake_inverts_duty() {
    let mut bench = Bench::new();
    let wiring = BrakeWiring {
        normally_engaged: true,
        ..ACTOR_BRAKE
    };
    let pwm = MockPwm::default();
    let mut brake = Brake::new(&wiring, pwm.clone(), &mut PinRegistry::new()).unwrap();
    assert_eq!(brake.duty_for(200), 55);

    brake
        .apply_parameters(&BrakeParams { breaking_strength: 200 }.encode())
        .unwrap();
    bench.execute(&mut brake, code(BrakeCommand::SetBreakingPower), 1_000);
    assert_eq!(pwm.duty(), Some(55));

    // Engaged at rest: engaging cuts power.
    bench.execute(&mut brake, code(BrakeCommand::ToggleOn), 1_000);
    assert_eq!(pwm.duty(), Some(0));
}

#[test]
fn locked_brake_keeps_its_duty() {
    let mut bench = Bench::new();
    let pwm = MockPwm::default();
    let mut brake = Brake::new(&ACTOR_BRAKE, pwm.clone(), &mut PinRegistry::new()).unwrap();
    bench.lock.engage();

    assert_eq!(
        bench.execute(&mut brake, code(BrakeCommand::ToggleOff), 1_000),
        Progress::Aborted
    );
    assert!(pwm.duties().is_empty());
    assert_eq!(bench.sink.codes(), vec![code(BrakeEvent::OutputLocked)]);
}

// ── Speaker ───────────────────────────────────────────────────

#[test]
fn speaker_pulse() {
    let mut bench = Bench::new();
    let pin = bench.pin();
    let wiring = SpeakerWiring {
        address: ModuleAddress::new(8, 1),
        pin: 4,
    };
    let mut speaker = Speaker::new(&wiring, pin.clone(), &mut PinRegistry::new()).unwrap();
    bench.setup(&mut speaker);

    assert_eq!(
        bench.execute(&mut speaker, code(SpeakerCommand::Pulse), 10_000),
        Progress::Completed
    );
    assert_eq!(pin.high_time(), 100_000);
    assert_eq!(
        bench.sink.codes(),
        vec![
            code(SpeakerEvent::Off),
            code(SpeakerEvent::On),
            code(SpeakerEvent::Off)
        ]
    );
    assert!(!speaker.is_sounding());
}

// ── Screen ────────────────────────────────────────────────────

fn screen(bench: &Bench) -> (Screen<MockPin>, [MockPin; 3]) {
    let pins = [bench.pin(), bench.pin(), bench.pin()];
    let s = Screen::new(&ACTOR_SCREEN, pins.clone(), &mut PinRegistry::new()).unwrap();
    (s, pins)
}

#[test]
fn screen_toggle_presses_all_relays_together() {
    let mut bench = Bench::new();
    let (mut screen, pins) = screen(&bench);
    bench.setup(&mut screen);
    screen
        .apply_parameters(&ScreenParams { pulse_duration: 200_000 }.encode())
        .unwrap();

    assert_eq!(
        bench.execute(&mut screen, code(ScreenCommand::Toggle), 10_000),
        Progress::Completed
    );
    for pin in &pins {
        assert_eq!(pin.levels(), vec![false, true, false]);
        assert_eq!(pin.high_time(), 200_000);
    }
    assert_eq!(
        bench.sink.codes(),
        vec![
            code(ScreenEvent::Off),
            code(ScreenEvent::On),
            code(ScreenEvent::Off)
        ]
    );
    assert!(!screen.is_pressed());
}

#[test]
fn locked_screen_touches_no_relay() {
    let mut bench = Bench::new();
    let (mut screen, pins) = screen(&bench);
    bench.lock.engage();

    assert_eq!(
        bench.execute(&mut screen, code(ScreenCommand::Toggle), 10_000),
        Progress::Aborted
    );
    assert!(pins.iter().all(|p| p.writes().is_empty()));
    assert_eq!(bench.sink.codes(), vec![code(ScreenEvent::OutputLocked)]);
}

#[test]
fn relay_fault_mid_press_releases_the_others() {
    let mut bench = Bench::new();
    let (mut screen, [left, centre, right]) = screen(&bench);
    centre.fail_writes(true);

    assert_eq!(
        bench.execute(&mut screen, code(ScreenCommand::Toggle), 10_000),
        Progress::Aborted
    );
    assert_eq!(left.levels(), vec![true, false]);
    assert!(centre.writes().is_empty());
    assert_eq!(right.levels(), vec![true, false]);
    assert!(!screen.is_pressed());
    assert!(bench.sink.reports.is_empty());
}
