use anyhow::{bail, ensure};
use logos::{Lexer, Logos};
use std::{fmt, str::FromStr, time::Duration};

/// A transmission rate, in bits per second.
///
/// Used both for the pace of an [`Emitter`] and for the speed at which a
/// [`Link`] puts bits on the wire. Units use SI multipliers: `1kbps` is
/// `1_000` bits per second and `1Mbps` is `1_000_000`.
///
/// # Example
///
/// ```
/// # use alertsim_core::measure::DataRate;
/// # use std::time::Duration;
/// let rate: DataRate = "50Mbps".parse().unwrap();
/// assert_eq!(rate.bits_per_sec(), 50_000_000);
///
/// // 2048 bytes at 50Mbps
/// assert_eq!(
///     rate.transmission_time(2_048),
///     Duration::from_nanos(327_680),
/// );
/// ```
///
/// [`Emitter`]: crate::app::Emitter
/// [`Link`]: crate::link::Link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataRate(u64);

const K: u64 = 1_000;
const M: u64 = 1_000_000;
const G: u64 = 1_000_000_000;

impl DataRate {
    /// no data can flow
    pub const ZERO: Self = Self(0);

    /// create a new [`DataRate`] of `bits_per_sec` bits per second.
    #[inline]
    pub const fn new(bits_per_sec: u64) -> Self {
        Self(bits_per_sec)
    }

    #[inline]
    pub const fn from_kbps(kbps: u64) -> Self {
        Self(kbps.saturating_mul(K))
    }

    #[inline]
    pub const fn from_mbps(mbps: u64) -> Self {
        Self(mbps.saturating_mul(M))
    }

    #[inline]
    pub const fn bits_per_sec(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// How long it takes to push `bytes` at this rate: `bytes * 8 / rate`.
    ///
    /// The result is truncated to the nanosecond. A zero rate never
    /// completes and returns [`Duration::MAX`].
    ///
    /// ```
    /// # use alertsim_core::measure::DataRate;
    /// # use std::time::Duration;
    /// let rate = DataRate::from_mbps(10);
    /// assert_eq!(rate.transmission_time(5_120), Duration::from_micros(4_096));
    /// ```
    pub fn transmission_time(&self, bytes: u64) -> Duration {
        if self.0 == 0 {
            return Duration::MAX;
        }
        let bits = u128::from(bytes) * 8;
        let nanos = bits * 1_000_000_000 / u128::from(self.0);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.0;

        if v >= G && v % G == 0 {
            write!(f, "{}Gbps", v / G)
        } else if v >= M && v % M == 0 {
            write!(f, "{}Mbps", v / M)
        } else if v >= K && v % K == 0 {
            write!(f, "{}kbps", v / K)
        } else {
            write!(f, "{v}bps")
        }
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")] // Ignore this regex pattern between tokens
enum DataRateToken {
    #[regex("[bB]ps")]
    Bps,
    #[regex("[kK]bps")]
    Kbps,
    #[regex("[mM]bps")]
    Mbps,
    #[regex("[gG]bps")]
    Gbps,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Value,
}

impl FromStr for DataRate {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, DataRateToken>::new(s);

        let Some(Ok(DataRateToken::Value)) = lex.next() else {
            bail!("Expecting to parse a number")
        };
        let number = lex.slice();
        let Some(Ok(token)) = lex.next() else {
            bail!("Expecting to parse a unit")
        };
        let unit = match token {
            DataRateToken::Bps => 1,
            DataRateToken::Kbps => K,
            DataRateToken::Mbps => M,
            DataRateToken::Gbps => G,
            DataRateToken::Value => bail!("Expecting to parse a unit (bps, kbps, Mbps, Gbps)"),
        };

        ensure!(
            lex.next().is_none(),
            "Not expecting any other tokens to parse a data rate"
        );

        Ok(Self(crate::time::scaled(number, unit)?))
    }
}

impl Default for DataRate {
    fn default() -> Self {
        crate::defaults::DEFAULT_DATA_RATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_data_rate() {
        macro_rules! assert_rate {
            ($string:literal == $value:expr) => {
                assert_eq!(
                    $string.parse::<DataRate>().unwrap(),
                    DataRate::new($value)
                );
            };
        }

        assert_rate!("0bps" == 0);
        assert_rate!("42bps" == 42);
        assert_rate!("42kbps" == 42_000);
        assert_rate!("10Mbps" == 10_000_000);
        assert_rate!("50mbps" == 50_000_000);
        assert_rate!("1.5Mbps" == 1_500_000);
        assert_rate!("1Gbps" == 1_000_000_000);
    }

    #[test]
    fn print_data_rate() {
        assert_eq!(DataRate::new(0).to_string(), "0bps");
        assert_eq!(DataRate::new(999).to_string(), "999bps");
        assert_eq!(DataRate::new(32_000).to_string(), "32kbps");
        assert_eq!(DataRate::from_mbps(100).to_string(), "100Mbps");
        assert_eq!(DataRate::new(1_500_000).to_string(), "1500kbps");
        assert_eq!(DataRate::new(2 * G).to_string(), "2Gbps");
    }

    #[test]
    fn parse_invalid_strings() {
        assert!("42".parse::<DataRate>().is_err()); // no unit
        assert!("mbps".parse::<DataRate>().is_err()); // no number
        assert!("".parse::<DataRate>().is_err()); // empty
        assert!("42Mbps extra".parse::<DataRate>().is_err()); // trailing token
    }

    #[test]
    fn transmission_time() {
        assert_eq!(
            DataRate::from_mbps(10).transmission_time(5_120),
            Duration::from_nanos(4_096_000)
        );
        assert_eq!(
            DataRate::from_mbps(50).transmission_time(2_048),
            Duration::from_nanos(327_680)
        );
        assert_eq!(
            DataRate::from_mbps(100).transmission_time(0),
            Duration::ZERO
        );
        // 1 byte at 3bps = 2.666..s, truncated
        assert_eq!(
            DataRate::new(3).transmission_time(1),
            Duration::from_nanos(2_666_666_666)
        );
    }

    #[test]
    fn zero_rate_never_completes() {
        assert_eq!(DataRate::ZERO.transmission_time(1), Duration::MAX);
    }
}
