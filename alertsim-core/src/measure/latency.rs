use std::{fmt, str::FromStr, time::Duration};

/// The one-way propagation delay of a [`Link`].
///
/// Once the last bit of a packet has left the transmitter it takes the
/// link's latency for it to reach the other end.
///
/// # Default [`Latency`]
///
/// ```
/// # use alertsim_core::measure::Latency;
/// assert_eq!(
///     Latency::default().to_string(),
///     "5ms"
/// )
/// ```
///
/// [`Link`]: crate::link::Link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Latency(Duration);

impl Latency {
    /// The `0` latency. I.e. the packet is received as soon as it is sent.
    pub const ZERO: Self = Self::new(Duration::ZERO);

    /// create a new latency with the given [`Duration`].
    ///
    /// ```
    /// # use alertsim_core::measure::Latency;
    /// # use std::time::Duration;
    /// let latency = Latency::new(Duration::from_millis(10));
    /// assert_eq!(latency.to_string(), "10ms");
    /// ```
    #[inline(always)]
    pub const fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// get the inner duration
    #[inline(always)]
    pub fn into_duration(self) -> Duration {
        self.0
    }
}

impl From<Latency> for Duration {
    fn from(value: Latency) -> Self {
        value.into_duration()
    }
}
impl From<Duration> for Latency {
    fn from(value: Duration) -> Self {
        Self::new(value)
    }
}

impl Default for Latency {
    fn default() -> Self {
        crate::defaults::DEFAULT_LATENCY
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Duration as fmt::Debug>::fmt(&self.0, f)
    }
}

impl FromStr for Latency {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::time::parse_duration(s).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default() {
        assert_eq!(Latency::default(), crate::defaults::DEFAULT_LATENCY);
    }

    #[test]
    fn display() {
        assert_eq!(
            Latency::new(Duration::from_millis(150)).to_string(),
            "150ms"
        );
        assert_eq!(
            Latency::new(Duration::from_millis(1_542)).to_string(),
            "1.542s"
        );
        assert_eq!(Latency::new(Duration::from_nanos(1_500)).to_string(), "1.5µs");
    }

    #[test]
    fn parse() {
        assert_eq!(
            Latency::new(Duration::from_millis(10)),
            "10ms".parse().unwrap(),
        );
        assert_eq!(
            Latency::new(Duration::from_millis(1_542)),
            "1s542ms".parse().unwrap(),
        );
        assert_eq!(
            Latency::new(Duration::from_micros(250)),
            "0.25ms".parse().unwrap(),
        );
    }

    #[test]
    fn parse_invalid_strings() {
        assert!("150".parse::<Latency>().is_err());
        assert!("abc".parse::<Latency>().is_err());
        assert!("".parse::<Latency>().is_err());
    }

    #[test]
    fn display_round_trip() {
        let latencies = [
            Duration::from_millis(150),
            Duration::from_micros(250),
            Duration::from_nanos(327_680),
            Duration::from_nanos(800),
            Duration::from_millis(1_542),
        ];
        for duration in latencies {
            let shown = Latency::new(duration).to_string();
            let parsed: Latency = shown.parse().unwrap();
            assert_eq!(parsed.into_duration(), duration, "{shown}");
        }
    }
}
