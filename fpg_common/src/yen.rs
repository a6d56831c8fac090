use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const YEN_CURRENCY_CODE: &str = "jpy";

//--------------------------------------        Yen          ---------------------------------------------------------
/// An amount of money in yen. Yen has no minor unit, so the processor's integer amounts map onto this directly.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Yen(i64);

op!(binary Yen, Add, add);
op!(binary Yen, Sub, sub);
op!(inplace Yen, AddAssign, add_assign);
op!(inplace Yen, SubAssign, sub_assign);
op!(unary Yen, Neg, neg);

impl Mul<i64> for Yen {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Yen {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in yen: {0}")]
pub struct YenConversionError(String);

impl From<i64> for Yen {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Yen {
    type Error = YenConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| YenConversionError(format!("Value {value} is too large to convert to Yen")))
    }
}

impl Display for Yen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "¥{}", self.0)
    }
}

impl Yen {
    pub fn value(&self) -> i64 {
        self.0
    }
}
