use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorPseudoClass {
    Checked,
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<SelectorAttrCondition>,
    pub(crate) pseudo_classes: Vec<SelectorPseudoClass>,
}

impl SelectorStep {
    pub(crate) fn id_only(&self) -> Option<&str> {
        if !self.universal
            && self.tag.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudo_classes.is_empty()
        {
            self.id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorCombinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    // Relation to previous (left) selector part.
    pub(crate) combinator: Option<SelectorCombinator>,
}

pub(crate) fn parse_selector_groups(selector: &str) -> Result<Vec<Vec<SelectorPart>>> {
    let mut groups = Vec::new();
    for group in split_top_level_commas(selector)? {
        groups.push(parse_selector_chain(&group)?);
    }
    if groups.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    Ok(groups)
}

fn split_top_level_commas(selector: &str) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            ',' if bracket_depth == 0 => {
                if current.trim().is_empty() {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 || current.trim().is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    parts.push(current.trim().to_string());
    Ok(parts)
}

pub(crate) fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let tokens = tokenize_selector(selector)?;
    let mut steps: Vec<SelectorPart> = Vec::new();
    let mut pending_combinator: Option<SelectorCombinator> = None;

    for token in tokens {
        if token == ">" {
            if pending_combinator.is_some() || steps.is_empty() {
                return Err(Error::UnsupportedSelector(selector.into()));
            }
            pending_combinator = Some(SelectorCombinator::Child);
            continue;
        }

        let step = parse_selector_step(&token)?;
        let combinator = if steps.is_empty() {
            None
        } else {
            Some(pending_combinator.unwrap_or(SelectorCombinator::Descendant))
        };
        pending_combinator = None;
        steps.push(SelectorPart { step, combinator });
    }

    if pending_combinator.is_some() || steps.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    Ok(steps)
}

fn tokenize_selector(selector: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            c if c.is_whitespace() && bracket_depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '>' if bracket_depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(">".to_string());
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    if tokens.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    Ok(tokens)
}

fn parse_selector_step(token: &str) -> Result<SelectorStep> {
    let mut step = SelectorStep::default();
    let chars: Vec<char> = token.chars().collect();
    let mut i = 0usize;

    if i < chars.len() && chars[i] == '*' {
        step.universal = true;
        i += 1;
    } else if i < chars.len() && is_ident_start(chars[i]) {
        let start = i;
        while i < chars.len() && is_ident_char(chars[i]) {
            i += 1;
        }
        step.tag = Some(
            chars[start..i]
                .iter()
                .collect::<String>()
                .to_ascii_lowercase(),
        );
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                i += 1;
                let name = read_ident(&chars, &mut i, token)?;
                step.id = Some(name);
            }
            '.' => {
                i += 1;
                let name = read_ident(&chars, &mut i, token)?;
                step.classes.push(name);
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| i + offset)
                    .ok_or_else(|| Error::UnsupportedSelector(token.into()))?;
                let body: String = chars[i + 1..close].iter().collect();
                step.attrs.push(parse_attr_condition(&body, token)?);
                i = close + 1;
            }
            ':' => {
                i += 1;
                let name = read_ident(&chars, &mut i, token)?;
                let pseudo = match name.as_str() {
                    "checked" => SelectorPseudoClass::Checked,
                    "disabled" => SelectorPseudoClass::Disabled,
                    _ => return Err(Error::UnsupportedSelector(token.into())),
                };
                step.pseudo_classes.push(pseudo);
            }
            _ => return Err(Error::UnsupportedSelector(token.into())),
        }
    }

    if step.tag.is_none()
        && !step.universal
        && step.id.is_none()
        && step.classes.is_empty()
        && step.attrs.is_empty()
        && step.pseudo_classes.is_empty()
    {
        return Err(Error::UnsupportedSelector(token.into()));
    }
    Ok(step)
}

fn parse_attr_condition(body: &str, token: &str) -> Result<SelectorAttrCondition> {
    let body = body.trim();
    if body.is_empty() {
        return Err(Error::UnsupportedSelector(token.into()));
    }

    let Some(eq) = body.find('=') else {
        if !body.chars().all(is_ident_char) {
            return Err(Error::UnsupportedSelector(token.into()));
        }
        return Ok(SelectorAttrCondition::Exists {
            key: body.to_ascii_lowercase(),
        });
    };

    let key = body[..eq].trim();
    if key.is_empty() || !key.chars().all(is_ident_char) {
        return Err(Error::UnsupportedSelector(token.into()));
    }
    let value = strip_quotes(body[eq + 1..].trim());
    Ok(SelectorAttrCondition::Eq {
        key: key.to_ascii_lowercase(),
        value: value.to_string(),
    })
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn read_ident(chars: &[char], i: &mut usize, token: &str) -> Result<String> {
    let start = *i;
    while *i < chars.len() && is_ident_char(chars[*i]) {
        *i += 1;
    }
    if *i == start {
        return Err(Error::UnsupportedSelector(token.into()));
    }
    Ok(chars[start..*i].iter().collect())
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
