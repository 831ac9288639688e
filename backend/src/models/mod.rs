mod customer;
mod order;
mod product;

pub use customer::*;
pub use order::*;
pub use product::*;

use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};

/// Most fractional digits accepted for quantities and prices. JSON numbers
/// past this are either rounded on parse or lose digits when written back.
pub const MAX_SCALE: u32 = 6;

fn check_scale(field: &str, value: Decimal) -> AppResult<()> {
    if value.normalize().scale() > MAX_SCALE {
        return Err(AppError::BadRequest(format!(
            "{field} must have at most {MAX_SCALE} decimal places"
        )));
    }
    Ok(())
}
