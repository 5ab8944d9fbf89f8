//! Lexical statement splitting for SQL the parser does not understand
//!
//! Splits on `;` only at the top level: semicolons inside quoted strings,
//! quoted identifiers, dollar-quoted bodies and `BEGIN ... END` blocks of
//! `CREATE TRIGGER` / `CREATE PROCEDURE` statements stay in their statement.
//! Comments are dropped.

/// Words that close a compound statement in `END <word>` form without
/// having opened a block of their own
const END_QUALIFIERS: [&str; 4] = ["IF", "LOOP", "WHILE", "REPEAT"];

pub fn split_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                let end = quoted_end(&chars, i, c);
                current.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i = block_comment_end(&chars, i);
                current.push(' ');
            }
            '$' => {
                let end = dollar_quoted_end(&chars, i).unwrap_or(i + 1);
                current.extend(&chars[i..end]);
                i = end;
            }
            ';' if depth == 0 => {
                push_statement(&mut statements, &current);
                current.clear();
                i += 1;
            }
            c if is_word_char(c) && (i == 0 || !is_word_char(chars[i - 1])) => {
                let end = word_end(&chars, i);
                let word: String = chars[i..end].iter().collect::<String>().to_ascii_uppercase();
                current.extend(&chars[i..end]);
                i = end;

                match word.as_str() {
                    "BEGIN" if opens_block(&current) => depth += 1,
                    "CASE" => depth += 1,
                    "END" => {
                        let (next, next_end) = next_word(&chars, i);
                        if END_QUALIFIERS.contains(&next.as_str()) {
                            continue;
                        }
                        depth = depth.saturating_sub(1);
                        // END CASE closes the CASE it names
                        if next == "CASE" {
                            current.extend(&chars[i..next_end]);
                            i = next_end;
                        }
                    }
                    _ => {}
                }
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }

    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, statement: &str) {
    let statement = statement.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
}

/// Only bodies of routine and trigger definitions open a block; a bare
/// `BEGIN` starts a transaction.
fn opens_block(statement: &str) -> bool {
    statement
        .trim_start()
        .get(..6)
        .map_or(false, |head| head.eq_ignore_ascii_case("CREATE"))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn word_end(chars: &[char], start: usize) -> usize {
    let mut end = start;
    while end < chars.len() && is_word_char(chars[end]) {
        end += 1;
    }
    end
}

fn next_word(chars: &[char], from: usize) -> (String, usize) {
    let mut start = from;
    while start < chars.len() && chars[start].is_whitespace() {
        start += 1;
    }
    let end = word_end(chars, start);
    let word: String = chars[start..end].iter().collect();
    (word.to_ascii_uppercase(), end)
}

/// Index just past the closing quote; a doubled quote is an escaped quote
/// and simply reopens the literal on the next pass.
fn quoted_end(chars: &[char], start: usize, quote: char) -> usize {
    let mut end = start + 1;
    while end < chars.len() {
        if chars[end] == quote {
            return end + 1;
        }
        end += 1;
    }
    end
}

fn block_comment_end(chars: &[char], start: usize) -> usize {
    let mut end = start + 2;
    while end + 1 < chars.len() {
        if chars[end] == '*' && chars[end + 1] == '/' {
            return end + 2;
        }
        end += 1;
    }
    chars.len()
}

/// `$tag$ ... $tag$` bodies; `None` when `$` does not open one (e.g. `$1`)
fn dollar_quoted_end(chars: &[char], start: usize) -> Option<usize> {
    let mut tag_end = start + 1;
    if chars.get(tag_end).map_or(false, |c| c.is_ascii_digit()) {
        return None;
    }
    while tag_end < chars.len() && is_word_char(chars[tag_end]) {
        tag_end += 1;
    }
    if chars.get(tag_end) != Some(&'$') {
        return None;
    }

    let tag = &chars[start..=tag_end];
    let mut end = tag_end + 1;
    while end + tag.len() <= chars.len() {
        if &chars[end..end + tag.len()] == tag {
            return Some(end + tag.len());
        }
        end += 1;
    }
    Some(chars.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semicolons_in_literals_stay_put() {
        let statements = split_statements(
            "INSERT INTO notes (body) VALUES ('a;b'); INSERT INTO notes (body) VALUES ('it''s; fine');",
        );
        assert_eq!(
            statements,
            vec![
                "INSERT INTO notes (body) VALUES ('a;b')",
                "INSERT INTO notes (body) VALUES ('it''s; fine')",
            ]
        );
    }

    #[test]
    fn test_trigger_body_is_one_statement() {
        let sql = "CREATE TABLE a (id INTEGER, s TEXT);\n\
                   CREATE TRIGGER trg AFTER INSERT ON a BEGIN UPDATE a SET s = 'x;y' WHERE id = NEW.id; END;\n\
                   INSERT INTO a (id) VALUES (1);";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[1],
            "CREATE TRIGGER trg AFTER INSERT ON a BEGIN UPDATE a SET s = 'x;y' WHERE id = NEW.id; END"
        );
        assert_eq!(statements[2], "INSERT INTO a (id) VALUES (1)");
    }

    #[test]
    fn test_procedure_with_nested_blocks() {
        let sql = "CREATE PROCEDURE p() BEGIN IF 1 THEN SELECT 1; END IF; \
                   SELECT CASE WHEN 1 THEN 'a' END; END; SELECT 2;";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].ends_with("END"));
        assert_eq!(statements[1], "SELECT 2");
    }

    #[test]
    fn test_dollar_quoted_function_body() {
        let sql = "CREATE FUNCTION touch() RETURNS trigger AS $$ BEGIN NEW.at := now(); RETURN NEW; END; $$ LANGUAGE plpgsql;\n\
                   SELECT $1;";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].ends_with("LANGUAGE plpgsql"));
        assert_eq!(statements[1], "SELECT $1");
    }

    #[test]
    fn test_transaction_begin_is_not_a_block() {
        let statements = split_statements("BEGIN; CREATE TABLE a (id INTEGER); COMMIT;");
        assert_eq!(statements, vec!["BEGIN", "CREATE TABLE a (id INTEGER)", "COMMIT"]);
    }

    #[test]
    fn test_comments_are_dropped() {
        let statements = split_statements("-- first; still a comment\nSELECT 1; /* a;b */ SELECT 2");
        assert_eq!(statements, vec!["SELECT 1", "SELECT 2"]);
    }
}
