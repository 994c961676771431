use crate::validation::ValidationError;

const MAX_NAME_LEN: usize = 12;

/// Checks an EOS account name: 1 to 12 characters from `a-z`, `1-5` and `.`,
/// not ending with `.`.
pub fn validate_account_name(name: &str) -> Result<(), ValidationError> {
	if name.is_empty() {
		return Err(ValidationError::EmptyAccountName);
	}

	let len = name.chars().count();
	if len > MAX_NAME_LEN {
		return Err(ValidationError::AccountNameTooLong(len));
	}

	if let Some(bad) = name
		.chars()
		.find(|c| !matches!(c, 'a'..='z' | '1'..='5' | '.'))
	{
		return Err(ValidationError::InvalidCharacter(bad));
	}

	if name.ends_with('.') {
		return Err(ValidationError::TrailingDot);
	}

	Ok(())
}
