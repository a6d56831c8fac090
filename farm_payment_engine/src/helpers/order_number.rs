//! Human-facing order numbers.
//!
//! An order number is `<prefix><YY><MM><DD><NNNN>`, e.g. `FM2403150427`. The date is the shop's local (JST) date at
//! the moment of payment, and `NNNN` is four random digits. Uniqueness is left to the database constraint.
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rand::Rng;

pub const DEFAULT_ORDER_NUMBER_PREFIX: &str = "FM";

const JST_OFFSET_SECS: i32 = 9 * 3600;

/// The current calendar date in Japan.
pub fn jst_today() -> NaiveDate {
    jst_date(Utc::now())
}

fn jst_date(at: DateTime<Utc>) -> NaiveDate {
    match FixedOffset::east_opt(JST_OFFSET_SECS) {
        Some(jst) => at.with_timezone(&jst).date_naive(),
        None => at.date_naive(),
    }
}

pub fn generate_order_number<R: Rng + ?Sized>(prefix: &str, date: NaiveDate, rng: &mut R) -> String {
    let suffix: u16 = rng.gen_range(0..10_000);
    format!("{prefix}{}{suffix:04}", date.format("%y%m%d"))
}
