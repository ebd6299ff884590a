pub fn extract_code_block(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut inner = match trimmed.split_once('\n') {
        Some((_, rest)) => rest,
        None => return String::new(),
    };
    if let Some(end) = inner.rfind("```") {
        inner = &inner[..end];
    }
    inner.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_language_fences() {
        let body = "resource \"null_resource\" \"cleanup\" {}";
        assert_eq!(extract_code_block(&format!("```hcl\n{body}\n```\n")), body);
        assert_eq!(extract_code_block(&format!("```terraform\n{body}\n```")), body);
        assert_eq!(extract_code_block(&format!("```\n{body}\n```")), body);
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(extract_code_block("  # plain\nlocals {}  \n"), "# plain\nlocals {}");
        assert_eq!(extract_code_block("```"), "");
    }
}
