use anyhow::{Result, anyhow, bail, ensure};
use logos::{Lexer, Logos};
use std::{
    fmt,
    ops::{Add, AddAssign},
    str::FromStr,
    time::Duration,
};

/// A point on the simulation's virtual clock.
///
/// Virtual time starts at [`SimTime::ZERO`] and only moves forward when the
/// [`Scheduler`] dispatches an event. It is independent of the wall clock and
/// has a resolution of one nanosecond.
///
/// ```
/// # use alertsim_core::SimTime;
/// # use std::time::Duration;
/// let start: SimTime = "2.1s".parse().unwrap();
/// assert_eq!(start, SimTime::from_millis(2_100));
/// assert_eq!(start + Duration::from_micros(500), "2s 100ms 500us".parse().unwrap());
/// ```
///
/// [`Scheduler`]: crate::scheduler::Scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

impl SimTime {
    /// The beginning of every simulation.
    pub const ZERO: Self = Self(0);

    /// The latest representable instant.
    pub const MAX: Self = Self(u64::MAX);

    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros.saturating_mul(1_000))
    }

    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    #[inline]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// seconds since the start of the simulation, as printed in the logs
    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// the time elapsed since the given instant, or zero if `earlier`
    /// is actually later than `self`.
    pub fn saturating_duration_since(self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// offset this instant by `duration`, saturating at [`SimTime::MAX`]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(nanos))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = self.saturating_add(rhs);
    }
}

impl From<Duration> for SimTime {
    fn from(value: Duration) -> Self {
        Self::ZERO + value
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs_f64())
    }
}

impl FromStr for SimTime {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let duration = parse_duration(s)?;
        let nanos = u64::try_from(duration.as_nanos())
            .map_err(|_| anyhow!("`{s}' is beyond the simulation clock range"))?;
        Ok(Self(nanos))
    }
}

/// parse a human readable duration such as `10ms`, `2.1s` or `1s 500ms`.
///
/// Every component is a number (optionally with a decimal part) followed by
/// a unit. The components are summed.
pub(crate) fn parse_duration(s: &str) -> Result<Duration> {
    let mut lex = Lexer::<'_, Token>::new(s);

    let mut nanos: u64 = 0;
    let mut components = 0;

    while let Some(next) = lex.next() {
        let number: Token = next.map_err(|()| anyhow!("Failed to parse: {s}"))?;

        ensure!(
            number == Token::Value,
            "Expecting duration to starts with number. Cannot parse {s}"
        );
        let value = lex.slice();

        let Some(Ok(measure)) = lex.next() else {
            bail!("Expecting a measure, failed to parse: {s}")
        };
        let unit = match measure {
            Token::NanoSeconds => 1,
            Token::MicroSeconds => 1_000,
            Token::MilliSeconds => 1_000_000,
            Token::Seconds => 1_000_000_000,
            Token::Minutes => 60_000_000_000,
            Token::Value => bail!("Failed to parse `{s}', expecting a measure."),
        };
        let component = scaled(value, unit)?;
        nanos = nanos
            .checked_add(component)
            .ok_or_else(|| anyhow!("`{s}' overflows"))?;
        components += 1;
    }

    ensure!(components > 0, "Empty duration");

    Ok(Duration::from_nanos(nanos))
}

/// multiply a decimal literal (`"42"`, `"2.125"`) by `unit` without going
/// through floating point, truncating whatever falls below one unit of the
/// result.
pub(crate) fn scaled(number: &str, unit: u64) -> Result<u64> {
    let (integer, fraction) = number.split_once('.').unwrap_or((number, ""));

    let integer: u64 = integer.parse()?;
    let whole = integer
        .checked_mul(unit)
        .ok_or_else(|| anyhow!("`{number}' is too large"))?;

    // more than 18 fractional digits cannot matter once truncated
    let fraction = &fraction[..fraction.len().min(18)];
    if fraction.is_empty() {
        return Ok(whole);
    }
    let digits: u128 = fraction.parse()?;
    let part = digits * u128::from(unit) / 10u128.pow(fraction.len() as u32);

    whole
        .checked_add(part as u64)
        .ok_or_else(|| anyhow!("`{number}' is too large"))
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")] // Ignore this regex pattern between tokens
enum Token {
    #[token("ns")]
    NanoSeconds,
    #[regex("us|μs|µs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,
    #[token("m")]
    Minutes,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Value,
}
