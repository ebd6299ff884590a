#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSpec {
    pub name: String,
    pub profile: String,
}

impl AccountSpec {
    pub fn new(name: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profile: profile.into(),
        }
    }
}

/// Parses `"prod:default,staging:staging-profile,dev"`. A bare name is its own profile; an
/// empty config means a single `default:default` account.
pub fn parse_accounts(config: &str) -> Vec<AccountSpec> {
    let accounts: Vec<AccountSpec> = config
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once(':') {
            Some((name, profile)) => AccountSpec::new(name.trim(), profile.trim()),
            None => AccountSpec::new(part, part),
        })
        .collect();

    if accounts.is_empty() {
        return vec![AccountSpec::new("default", "default")];
    }
    accounts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_profiles() {
        let parsed = parse_accounts("prod:default, staging : staging-profile,dev");
        assert_eq!(
            parsed,
            vec![
                AccountSpec::new("prod", "default"),
                AccountSpec::new("staging", "staging-profile"),
                AccountSpec::new("dev", "dev"),
            ]
        );
    }

    #[test]
    fn profile_may_contain_colons() {
        let parsed = parse_accounts("audit:arn:aws:iam::123456789012:role/ReadOnly");
        assert_eq!(parsed[0].profile, "arn:aws:iam::123456789012:role/ReadOnly");
    }

    #[test]
    fn empty_config_falls_back_to_default() {
        assert_eq!(parse_accounts("  "), vec![AccountSpec::new("default", "default")]);
        assert_eq!(parse_accounts(",,"), vec![AccountSpec::new("default", "default")]);
    }
}
