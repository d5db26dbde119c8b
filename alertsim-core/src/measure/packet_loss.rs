use anyhow::{bail, ensure};
use logos::{Lexer, Logos};
use rand_core::Rng;
use std::{fmt, str::FromStr};
use thiserror::Error;

const MILLION: u32 = 1_000_000;

/// Share of the packets a [`Link`] drops before transmitting them, with a
/// resolution of one packet per million.
///
/// Each packet is dropped independently. The decision is drawn from the
/// network's seeded generator when the packet is handed to the link, a
/// dropped packet never occupies the transmitter and is counted as
/// [`DropReason::LinkLoss`] in its flow.
///
/// ```
/// use alertsim_core::PacketLoss;
///
/// let lossy: PacketLoss = "2.5%".parse().unwrap();
/// assert_eq!(lossy.ppm(), 25_000);
/// assert_eq!(lossy.to_string(), "2.5%");
/// assert_eq!(PacketLoss::from_probability(0.025).unwrap(), lossy);
/// ```
///
/// [`Link`]: crate::link::Link
/// [`DropReason::LinkLoss`]: crate::stats::DropReason::LinkLoss
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketLoss {
    ppm: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PacketLossError {
    #[error("Packet loss of {0} packets per million is above 100%")]
    AboveAll(u64),
    #[error("Packet loss probability must be in [0, 1], got {0}")]
    NotAProbability(f64),
}

impl PacketLoss {
    /// lossless link (default)
    pub const NONE: Self = Self { ppm: 0 };

    /// every packet is dropped
    pub const ALL: Self = Self { ppm: MILLION };

    /// # Errors
    ///
    /// [`PacketLossError::AboveAll`] above one million.
    pub const fn from_ppm(ppm: u32) -> Result<Self, PacketLossError> {
        if ppm > MILLION {
            return Err(PacketLossError::AboveAll(ppm as u64));
        }
        Ok(Self { ppm })
    }

    /// The probability is rounded to the nearest packet per million.
    ///
    /// # Errors
    ///
    /// [`PacketLossError::NotAProbability`] outside `[0, 1]`, NaN included.
    pub fn from_probability(probability: f64) -> Result<Self, PacketLossError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(PacketLossError::NotAProbability(probability));
        }
        let ppm = (probability * f64::from(MILLION)).round() as u32;
        Ok(Self { ppm })
    }

    /// dropped packets per million
    #[inline]
    pub const fn ppm(self) -> u32 {
        self.ppm
    }

    #[inline]
    pub fn probability(self) -> f64 {
        f64::from(self.ppm) / f64::from(MILLION)
    }

    #[inline]
    pub const fn is_lossless(self) -> bool {
        self.ppm == 0
    }

    /// Tell if the next packet is dropped.
    ///
    /// Only a partial loss consumes a draw: a lossless or fully lossy link
    /// leaves `rng` untouched, so adding such a link to a topology does not
    /// change the decisions taken on the others.
    pub(crate) fn drops<R: Rng>(self, rng: &mut R) -> bool {
        match self.ppm {
            0 => false,
            MILLION => true,
            ppm => {
                // the upper 32 bits scaled down to [0, 1_000_000)
                let draw = ((rng.next_u64() >> 32) * u64::from(MILLION)) >> 32;
                draw < u64::from(ppm)
            }
        }
    }
}

impl fmt::Display for PacketLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.ppm / 10_000;
        let fraction = self.ppm % 10_000;
        if fraction == 0 {
            return write!(f, "{whole}%");
        }
        let digits = format!("{fraction:04}");
        write!(f, "{whole}.{}%", digits.trim_end_matches('0'))
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum PacketLossToken {
    #[token("%")]
    Percent,
    #[token("ppm")]
    PartsPerMillion,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Value,
}

impl FromStr for PacketLoss {
    type Err = anyhow::Error;

    /// Parses a percentage (`"0%"`, `"2.5%"`) or a count of packets per
    /// million (`"250ppm"`). Digits below one packet per million are
    /// truncated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, PacketLossToken>::new(s);

        let Some(Ok(PacketLossToken::Value)) = lex.next() else {
            bail!("Expecting a number, failed to parse `{s}'")
        };
        let number = lex.slice();
        let scale = match lex.next() {
            Some(Ok(PacketLossToken::Percent)) => 10_000,
            Some(Ok(PacketLossToken::PartsPerMillion)) => 1,
            _ => bail!("Expecting `%' or `ppm' after the number in `{s}'"),
        };
        ensure!(lex.next().is_none(), "Unexpected input after `{s}'");

        let ppm = crate::time::scaled(number, scale)?;
        let ppm = u32::try_from(ppm).map_err(|_| PacketLossError::AboveAll(ppm))?;
        Ok(Self::from_ppm(ppm)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaChaRng;
    use rand_core::SeedableRng as _;

    #[test]
    fn bounds() {
        assert_eq!(PacketLoss::from_ppm(MILLION), Ok(PacketLoss::ALL));
        assert_eq!(
            PacketLoss::from_ppm(MILLION + 1),
            Err(PacketLossError::AboveAll(1_000_001))
        );
        assert!(PacketLoss::from_probability(f64::NAN).is_err());
        assert!(PacketLoss::from_probability(-0.01).is_err());
        assert!(PacketLoss::from_probability(1.01).is_err());
        assert_eq!(PacketLoss::from_probability(0.0), Ok(PacketLoss::NONE));
        assert!(PacketLoss::default().is_lossless());
    }

    #[test]
    fn lossless_and_total_loss_do_not_draw() {
        let mut rng = ChaChaRng::seed_from_u64(7);
        let mut untouched = ChaChaRng::seed_from_u64(7);

        assert!((0..100).all(|_| !PacketLoss::NONE.drops(&mut rng)));
        assert!((0..100).all(|_| PacketLoss::ALL.drops(&mut rng)));
        assert_eq!(rng.next_u64(), untouched.next_u64());
    }

    #[test]
    fn partial_loss_rate() {
        let loss = PacketLoss::from_ppm(100_000).unwrap();
        let mut rng = ChaChaRng::seed_from_u64(42);

        let dropped = (0..10_000).filter(|_| loss.drops(&mut rng)).count();
        assert!(dropped > 800 && dropped < 1_200, "dropped {dropped}/10000");
    }

    #[test]
    fn same_seed_same_decisions() {
        let loss: PacketLoss = "30%".parse().unwrap();
        let decisions = |seed| {
            let mut rng = ChaChaRng::seed_from_u64(seed);
            (0..64).map(|_| loss.drops(&mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(decisions(3), decisions(3));
    }

    #[test]
    fn display() {
        assert_eq!(PacketLoss::NONE.to_string(), "0%");
        assert_eq!(PacketLoss::ALL.to_string(), "100%");
        assert_eq!(PacketLoss::from_ppm(50_000).unwrap().to_string(), "5%");
        assert_eq!(PacketLoss::from_ppm(123_000).unwrap().to_string(), "12.3%");
        assert_eq!(PacketLoss::from_ppm(1).unwrap().to_string(), "0.0001%");
    }

    #[test]
    fn parse() {
        assert_eq!("0%".parse::<PacketLoss>().unwrap(), PacketLoss::NONE);
        assert_eq!("100 %".parse::<PacketLoss>().unwrap(), PacketLoss::ALL);
        assert_eq!("250ppm".parse::<PacketLoss>().unwrap().ppm(), 250);
        assert_eq!("0.00015%".parse::<PacketLoss>().unwrap().ppm(), 1);

        assert!("5".parse::<PacketLoss>().is_err());
        assert!("%".parse::<PacketLoss>().is_err());
        assert!("abc%".parse::<PacketLoss>().is_err());
        assert!("150%".parse::<PacketLoss>().is_err());
        assert!("5% 5%".parse::<PacketLoss>().is_err());
    }

    #[test]
    fn printed_values_parse_back() {
        for ppm in [0, 1, 2_500, 50_000, 123_456, MILLION] {
            let loss = PacketLoss::from_ppm(ppm).unwrap();
            assert_eq!(loss.to_string().parse::<PacketLoss>().unwrap(), loss);
        }
    }
}
