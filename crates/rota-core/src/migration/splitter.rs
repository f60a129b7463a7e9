//! SQL 스크립트를 최상위 문장 단위로 분리.
//!
//! 다음 영역 안의 `;`는 문장 구분자로 취급하지 않습니다.
//!
//! - 달러 인용 블록 (`$$ ... $$`, `$tag$ ... $tag$`): 함수 본문, DO 블록
//! - 괄호 내부 (`CHECK (...)` 등)
//! - 작은따옴표 문자열 (`'a;b'`, `''` 이스케이프 포함)
//! - `E'...'` 이스케이프 문자열 (`\'` 포함)
//!
//! 문자열/달러 인용 밖의 `--`는 줄 끝까지 주석이며 문장 텍스트에서 제외됩니다.
//! 주석 안의 `'`, `;`, `(`, `$$`는 분리 상태에 영향을 주지 않습니다.
//! 문자열 안의 `--`는 그대로 남습니다. `/* */` 블록 주석은 지원하지 않습니다.
//!
//! 닫히지 않은 달러 인용/문자열/괄호는 별도 에러 없이 파일 끝까지를 한 문장으로
//! 취급합니다. 어떤 구간이 닫히지 않았는지는 [`SplitOutput::unterminated`]로 보고됩니다.

/// 분리된 문장 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    /// 문장 텍스트 (끝의 `;` 제외, 앞뒤 공백 제거)
    pub sql: String,
    /// 문장 시작 라인 (1-based)
    pub line: usize,
}

/// 파일 끝까지 닫히지 않은 구간
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unterminated {
    /// `$tag$`로 열린 달러 인용 블록
    DollarQuote { tag: String, line: usize },
    /// 작은따옴표 문자열
    StringLiteral { line: usize },
    /// 닫히지 않은 괄호
    Parenthesis { line: usize },
}

impl Unterminated {
    /// 구간이 시작된 라인
    pub fn line(&self) -> usize {
        match self {
            Unterminated::DollarQuote { line, .. }
            | Unterminated::StringLiteral { line }
            | Unterminated::Parenthesis { line } => *line,
        }
    }

    /// 사람이 읽을 수 있는 설명
    pub fn describe(&self) -> String {
        match self {
            Unterminated::DollarQuote { tag, .. } => {
                format!("unterminated dollar-quoted block opened with {}", tag)
            }
            Unterminated::StringLiteral { .. } => "unterminated string literal".to_string(),
            Unterminated::Parenthesis { .. } => "unbalanced parentheses".to_string(),
        }
    }
}

/// 분리 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitOutput {
    /// 원본 순서의 문장 목록
    pub statements: Vec<RawStatement>,
    /// 파일 끝에서 열려 있던 구간 (정상 입력이면 None)
    pub unterminated: Option<Unterminated>,
}

/// SQL 텍스트를 문장 목록으로 분리합니다.
pub fn split_statements(sql: &str) -> Vec<RawStatement> {
    split(sql).statements
}

/// SQL 텍스트를 분리하고, 닫히지 않은 구간이 있으면 함께 보고합니다.
pub fn split(sql: &str) -> SplitOutput {
    let chars: Vec<char> = sql.chars().collect();
    let len = chars.len();

    let mut out = SplitOutput::default();
    let mut current = String::new();
    let mut stmt_line: Option<usize> = None;
    let mut line = 1usize;

    let mut depth = 0usize;
    let mut paren_line = 0usize;
    let mut dollar_tag: Option<(String, usize)> = None;
    let mut string_line: Option<usize> = None;
    let mut backslash_escapes = false;

    let mut i = 0;
    while i < len {
        let c = chars[i];

        // 달러 인용 내부: 닫는 태그까지 그대로 복사
        if let Some((tag, _)) = &dollar_tag {
            if c == '$' && starts_with_at(&chars, i, tag) {
                current.push_str(tag);
                i += tag.chars().count();
                dollar_tag = None;
                continue;
            }
            if c == '\n' {
                line += 1;
            }
            current.push(c);
            i += 1;
            continue;
        }

        // 문자열 내부
        if string_line.is_some() {
            current.push(c);
            if backslash_escapes && c == '\\' && i + 1 < len {
                if chars[i + 1] == '\n' {
                    line += 1;
                }
                current.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '\'' {
                if i + 1 < len && chars[i + 1] == '\'' {
                    current.push('\'');
                    i += 2;
                    continue;
                }
                string_line = None;
            } else if c == '\n' {
                line += 1;
            }
            i += 1;
            continue;
        }

        match c {
            '-' if i + 1 < len && chars[i + 1] == '-' => {
                // 줄 끝까지 건너뜀 (개행 문자는 다음 루프에서 처리)
                while i < len && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '$' => {
                mark_start(&mut stmt_line, line);
                if let Some(tag) = dollar_tag_at(&chars, i) {
                    let tag_len = tag.chars().count();
                    current.push_str(&tag);
                    dollar_tag = Some((tag, line));
                    i += tag_len;
                    continue;
                }
                current.push(c);
            }
            '\'' => {
                mark_start(&mut stmt_line, line);
                string_line = Some(line);
                backslash_escapes = is_escape_prefix(&chars, i);
                current.push(c);
            }
            '(' => {
                mark_start(&mut stmt_line, line);
                if depth == 0 {
                    paren_line = line;
                }
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ';' if depth == 0 => {
                flush(&mut out.statements, &mut current, &mut stmt_line, line);
                i += 1;
                continue;
            }
            '\n' => {
                line += 1;
                current.push(c);
                i += 1;
                continue;
            }
            _ => {
                if !c.is_whitespace() {
                    mark_start(&mut stmt_line, line);
                }
                current.push(c);
            }
        }

        i += 1;
    }

    flush(&mut out.statements, &mut current, &mut stmt_line, line);

    out.unterminated = if let Some((tag, line)) = dollar_tag {
        Some(Unterminated::DollarQuote { tag, line })
    } else if let Some(line) = string_line {
        Some(Unterminated::StringLiteral { line })
    } else if depth > 0 {
        Some(Unterminated::Parenthesis { line: paren_line })
    } else {
        None
    };

    out
}

fn mark_start(stmt_line: &mut Option<usize>, line: usize) {
    if stmt_line.is_none() {
        *stmt_line = Some(line);
    }
}

fn flush(
    statements: &mut Vec<RawStatement>,
    current: &mut String,
    stmt_line: &mut Option<usize>,
    line: usize,
) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(RawStatement {
            sql: trimmed.to_string(),
            line: stmt_line.unwrap_or(line),
        });
    }
    current.clear();
    *stmt_line = None;
}

/// `i` 위치에서 시작하는 `$tag$` 구분자를 읽습니다.
///
/// `$1` 같은 위치 파라미터나 식별자 중간의 `$`는 구분자로 보지 않습니다.
fn dollar_tag_at(chars: &[char], i: usize) -> Option<String> {
    if i > 0 && (chars[i - 1].is_alphanumeric() || chars[i - 1] == '_') {
        return None;
    }

    let mut j = i + 1;
    while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
        j += 1;
    }
    if j >= chars.len() || chars[j] != '$' {
        return None;
    }
    if j > i + 1 && chars[i + 1].is_ascii_digit() {
        return None;
    }

    Some(chars[i..=j].iter().collect())
}

/// `i`의 `'` 앞에 단독 `E` 접두어가 붙어 있는지 (`E'...'` 이스케이프 문자열)
fn is_escape_prefix(chars: &[char], i: usize) -> bool {
    if i == 0 || !matches!(chars[i - 1], 'E' | 'e') {
        return false;
    }
    i < 2 || !(chars[i - 2].is_alphanumeric() || chars[i - 2] == '_')
}

fn starts_with_at(chars: &[char], i: usize, tag: &str) -> bool {
    let mut idx = i;
    for t in tag.chars() {
        if idx >= chars.len() || chars[idx] != t {
            return false;
        }
        idx += 1;
    }
    true
}
