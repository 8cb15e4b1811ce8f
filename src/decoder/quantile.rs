use crate::{data::Quantile, helper::parse_f64};

/// Parses a histogram snapshot of the form `0.5=12.5;0.99=99.9`.
///
/// Pairs are split on their first `=`.  A pair that is missing its `=`, or that has a side which
/// doesn't parse as a number, is skipped without affecting the others.  Output order follows the
/// input.
pub(crate) fn parse_quantiles(text: &str) -> Vec<Quantile> {
    text.split(';')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next()?;
            Some(Quantile::new(parse_f64(key)?, parse_f64(value)?))
        })
        .collect()
}
