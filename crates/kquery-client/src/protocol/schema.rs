//! Header schema parsing for `/query` responses
//!
//! The v1 header carries the schema as ksql text, e.g.
//! `` `TITLE` STRING, `S` STRUCT<`A` INTEGER, `B` ARRAY<STRING>> ``. Column
//! names are the backtick tokens found outside any `<…>`.

/// Column names of a v1 header schema, in order.
pub fn column_names(schema: &str) -> Vec<String> {
    let mut columns = Vec::new();
    let mut depth = 0usize;
    let mut current: Option<String> = None;

    for ch in schema.chars() {
        if let Some(token) = current.as_mut() {
            if ch == '`' {
                if depth == 0 {
                    columns.push(std::mem::take(token));
                }
                current = None;
            } else {
                token.push(ch);
            }
            continue;
        }

        match ch {
            '`' => current = Some(String::new()),
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    columns
}

/// Column types of a v1 header schema, in order.
pub fn column_types(schema: &str) -> Vec<String> {
    let mut types = Vec::new();
    let mut depth = 0usize;
    let mut in_name = false;
    let mut current = String::new();
    let mut collecting = false;

    for ch in schema.chars() {
        if in_name {
            if ch == '`' {
                in_name = false;
                if depth == 0 {
                    collecting = true;
                    current.clear();
                    continue;
                }
            }
            if collecting {
                current.push(ch);
            }
            continue;
        }

        match ch {
            '`' => {
                in_name = true;
                if collecting {
                    current.push(ch);
                }
                continue;
            }
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                types.push(current.trim().to_string());
                current.clear();
                collecting = false;
                continue;
            }
            _ => {}
        }
        if collecting {
            current.push(ch);
        }
    }

    if collecting && !current.trim().is_empty() {
        types.push(current.trim().to_string());
    }
    types
}
