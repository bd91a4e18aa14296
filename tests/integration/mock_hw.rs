//! Mock hardware for integration tests.
//!
//! Every mock shares one simulated microsecond clock, so pin histories carry
//! timestamps the tests can assert pulse widths against. Blocking delays
//! advance the same clock instead of sleeping.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorType, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use labrig::app::events::{ModuleAddress, Report};
use labrig::app::module::{Dispatch, Module, Services};
use labrig::app::ports::{AnalogInput, Clock, PulseCounter, ReportSink};
use labrig::safety::OutputLock;
use labrig::sequencer::{Execution, Progress};

// ── Fault ─────────────────────────────────────────────────────

/// Injected hardware failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault;

impl digital::Error for Fault {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

impl pwm::Error for Fault {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

// ── Clock and delay ───────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MockClock {
    now: Rc<Cell<u64>>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn advance(&self, us: u64) {
        self.now.set(self.now.get() + us);
    }

    pub fn set(&self, us: u64) {
        self.now.set(us);
    }
}

impl Clock for MockClock {
    fn now_us(&self) -> u64 {
        self.now.get()
    }
}

/// Advances the shared clock instead of sleeping.
#[derive(Debug, Clone)]
pub struct MockDelay {
    clock: MockClock,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance(u64::from(ns).div_ceil(1000));
    }
}

// ── Output pin ────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PinLog {
    writes: Vec<(bool, u64)>,
    fail: bool,
}

/// Digital output recording `(level, timestamp)` for every write.
/// Clones share one history.
#[derive(Debug, Clone)]
pub struct MockPin {
    clock: MockClock,
    log: Rc<RefCell<PinLog>>,
}

#[allow(dead_code)]
impl MockPin {
    pub fn new(clock: &MockClock) -> Self {
        Self {
            clock: clock.clone(),
            log: Rc::default(),
        }
    }

    pub fn writes(&self) -> Vec<(bool, u64)> {
        self.log.borrow().writes.clone()
    }

    pub fn levels(&self) -> Vec<bool> {
        self.log.borrow().writes.iter().map(|(l, _)| *l).collect()
    }

    pub fn level(&self) -> Option<bool> {
        self.log.borrow().writes.last().map(|(l, _)| *l)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.log.borrow_mut().fail = fail;
    }

    /// Microseconds the line spent HIGH, summed over completed pulses.
    pub fn high_time(&self) -> u64 {
        let writes = self.writes();
        let mut total = 0;
        let mut rose = None;
        for (level, at) in writes {
            match (level, rose) {
                (true, None) => rose = Some(at),
                (false, Some(start)) => {
                    total += at - start;
                    rose = None;
                }
                _ => {}
            }
        }
        total
    }

    fn record(&mut self, level: bool) -> Result<(), Fault> {
        let mut log = self.log.borrow_mut();
        if log.fail {
            return Err(Fault);
        }
        log.writes.push((level, self.clock.now_us()));
        Ok(())
    }
}

impl ErrorType for MockPin {
    type Error = Fault;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Fault> {
        self.record(false)
    }

    fn set_high(&mut self) -> Result<(), Fault> {
        self.record(true)
    }
}

// ── Input pin ─────────────────────────────────────────────────

#[derive(Debug, Default)]
struct InputScript {
    levels: VecDeque<bool>,
    last: bool,
    fail: bool,
    reads: u32,
}

/// Digital input replaying scripted levels; the last one repeats.
#[derive(Debug, Clone, Default)]
pub struct MockInput {
    script: Rc<RefCell<InputScript>>,
}

#[allow(dead_code)]
impl MockInput {
    pub fn constant(level: bool) -> Self {
        let input = Self::default();
        input.script.borrow_mut().last = level;
        input
    }

    pub fn push(&self, levels: &[bool]) {
        self.script.borrow_mut().levels.extend(levels);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.script.borrow_mut().fail = fail;
    }

    pub fn reads(&self) -> u32 {
        self.script.borrow().reads
    }
}

impl ErrorType for MockInput {
    type Error = Fault;
}

impl InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, Fault> {
        let mut s = self.script.borrow_mut();
        if s.fail {
            return Err(Fault);
        }
        s.reads += 1;
        if let Some(level) = s.levels.pop_front() {
            s.last = level;
        }
        Ok(s.last)
    }

    fn is_low(&mut self) -> Result<bool, Fault> {
        self.is_high().map(|h| !h)
    }
}

// ── ADC ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct AdcScript {
    samples: VecDeque<u16>,
    last: u16,
    fail: bool,
}

/// ADC channel replaying scripted samples; the last one repeats.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAdc {
    script: Rc<RefCell<AdcScript>>,
}

#[allow(dead_code)]
impl ScriptedAdc {
    pub fn new(samples: &[u16]) -> Self {
        let adc = Self::default();
        adc.push(samples);
        adc
    }

    pub fn push(&self, samples: &[u16]) {
        self.script.borrow_mut().samples.extend(samples);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.script.borrow_mut().fail = fail;
    }
}

impl AnalogInput for ScriptedAdc {
    type Error = Fault;

    fn read_raw(&mut self) -> Result<u16, Fault> {
        let mut s = self.script.borrow_mut();
        if s.fail {
            return Err(Fault);
        }
        if let Some(v) = s.samples.pop_front() {
            s.last = v;
        }
        Ok(s.last)
    }
}

// ── PWM ───────────────────────────────────────────────────────

/// 8-bit PWM channel recording every duty written.
#[derive(Debug, Clone, Default)]
pub struct MockPwm {
    duties: Rc<RefCell<Vec<u16>>>,
}

#[allow(dead_code)]
impl MockPwm {
    pub fn duties(&self) -> Vec<u16> {
        self.duties.borrow().clone()
    }

    pub fn duty(&self) -> Option<u16> {
        self.duties.borrow().last().copied()
    }
}

impl pwm::ErrorType for MockPwm {
    type Error = Fault;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Fault> {
        self.duties.borrow_mut().push(duty);
        Ok(())
    }
}

// ── Pulse counter ─────────────────────────────────────────────

#[derive(Debug, Default)]
struct CounterScript {
    takes: VecDeque<i32>,
    resets: u32,
}

/// Pulse counter whose successive `take()` results are scripted.
#[derive(Debug, Clone, Default)]
pub struct MockCounter {
    script: Rc<RefCell<CounterScript>>,
}

#[allow(dead_code)]
impl MockCounter {
    pub fn push(&self, takes: &[i32]) {
        self.script.borrow_mut().takes.extend(takes);
    }

    pub fn resets(&self) -> u32 {
        self.script.borrow().resets
    }
}

impl PulseCounter for MockCounter {
    fn take(&mut self) -> i32 {
        self.script.borrow_mut().takes.pop_front().unwrap_or(0)
    }

    fn reset(&mut self) {
        self.script.borrow_mut().resets += 1;
    }
}

// ── Report sink ───────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub reports: Vec<(ModuleAddress, Report)>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn codes(&self) -> Vec<u8> {
        self.reports.iter().map(|(_, r)| r.code).collect()
    }

    pub fn clear(&mut self) {
        self.reports.clear();
    }
}

impl ReportSink for RecordingSink {
    fn emit(&mut self, source: ModuleAddress, report: &Report) {
        self.reports.push((source, report.clone()));
    }
}

// ── Bench: stands in for the external scheduler ───────────────

pub struct Bench {
    pub clock: MockClock,
    pub delay: MockDelay,
    pub lock: OutputLock,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Bench {
    pub fn new() -> Self {
        let clock = MockClock::default();
        Self {
            delay: MockDelay {
                clock: clock.clone(),
            },
            clock,
            lock: OutputLock::new(),
            sink: RecordingSink::default(),
        }
    }

    pub fn pin(&self) -> MockPin {
        MockPin::new(&self.clock)
    }

    pub fn services(&mut self) -> Services<'_> {
        Services::new(&self.clock, &self.lock, &mut self.sink, &mut self.delay)
    }

    pub fn setup(&mut self, module: &mut impl Module) {
        let mut svc = self.services();
        module.setup(&mut svc).unwrap();
    }

    pub fn start(&self, command: u8) -> Execution {
        let mut exec = Execution::new();
        exec.start(command, self.clock.now_us());
        exec
    }

    pub fn tick(&mut self, module: &mut impl Module, exec: &mut Execution) -> Dispatch {
        let mut svc = self.services();
        module.run_active_command(exec, &mut svc)
    }

    /// Tick every `step_us` until the command leaves `Running`.
    pub fn run_to_end(
        &mut self,
        module: &mut impl Module,
        exec: &mut Execution,
        step_us: u64,
    ) -> Progress {
        for _ in 0..100_000 {
            match self.tick(module, exec) {
                Dispatch::Handled(Progress::Running) => self.clock.advance(step_us),
                Dispatch::Handled(done) => return done,
                Dispatch::Unhandled => panic!("command {} unhandled", exec.command()),
            }
        }
        panic!("command {} never finished", exec.command());
    }

    /// Start `command` and run it to the end.
    pub fn execute(&mut self, module: &mut impl Module, command: u8, step_us: u64) -> Progress {
        let mut exec = self.start(command);
        self.run_to_end(module, &mut exec, step_us)
    }
}
