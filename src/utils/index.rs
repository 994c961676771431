/// Renders a base-unit amount with `decimals` fractional digits, without going
/// through floating point.
pub fn format_token_amount(amount: i128, decimals: u32) -> String {
	let sign = if amount < 0 { "-" } else { "" };
	let magnitude = amount.unsigned_abs();
	if decimals == 0 {
		return format!("{}{}", sign, magnitude);
	}

	let scale = 10u128.pow(decimals);
	format!(
		"{}{}.{:0width$}",
		sign,
		magnitude / scale,
		magnitude % scale,
		width = decimals as usize
	)
}

/// Parses a decimal string such as `"12.5000000"` into base units.
///
/// Returns `None` for malformed input, more fractional digits than `decimals`, or
/// values that do not fit in an `i128`.
pub fn parse_decimal_amount(value: &str, decimals: u32) -> Option<i128> {
	let value = value.trim();
	let (negative, digits) = match value.strip_prefix('-') {
		Some(rest) => (true, rest),
		None => (false, value),
	};
	let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
	if whole.is_empty() && fraction.is_empty() {
		return None;
	}
	if fraction.len() > decimals as usize
		|| !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit())
	{
		return None;
	}

	let scale = 10i128.checked_pow(decimals)?;
	let whole: i128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
	let fraction: i128 = if fraction.is_empty() {
		0
	} else {
		fraction.parse::<i128>().ok()? * 10i128.pow(decimals - fraction.len() as u32)
	};

	let amount = whole.checked_mul(scale)?.checked_add(fraction)?;
	Some(if negative { -amount } else { amount })
}
