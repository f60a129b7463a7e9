//! 문장 유형 분류 및 테이블/외래키 추출.
//!
//! 완전한 SQL 문법 대신 선두 키워드 패턴으로 분류합니다. 알 수 없는 형태는
//! 실패하지 않고 `Other`로 분류되어 의존성 정보 없이 통과합니다.

use super::models::StatementType;

/// 스키마 접두어를 생략해도 되는 기본 스키마
const DEFAULT_SCHEMA: &str = "public";

/// 단일 문장의 분류 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// 문장 유형
    pub statement_type: StatementType,
    /// 대상 테이블
    pub table_name: Option<String>,
    /// 외래키로 참조하는 테이블 (중복 없음, 등장 순서)
    pub references: Vec<String>,
}

impl Classification {
    fn new(statement_type: StatementType) -> Self {
        Self {
            statement_type,
            table_name: None,
            references: Vec::new(),
        }
    }
}

/// 문장 하나를 분류합니다.
pub fn classify(sql: &str) -> Classification {
    let mut cursor = Cursor::new(sql);

    if cursor.eat_keyword("CREATE") {
        return classify_create(sql, cursor);
    }

    if cursor.eat_keyword("ALTER") {
        if cursor.eat_keyword("TABLE") {
            return classify_alter_table(sql, cursor);
        }
        return Classification::new(StatementType::Other);
    }

    if cursor.eat_keyword("DO") {
        // DO [LANGUAGE name] $tag$ ... $tag$
        if cursor.eat_keyword("LANGUAGE") {
            cursor.identifier();
        }
        cursor.skip_whitespace();
        if cursor.peek() == Some('$') {
            return Classification::new(StatementType::DoBlock);
        }
    }

    Classification::new(StatementType::Other)
}

fn classify_create(sql: &str, mut cursor: Cursor<'_>) -> Classification {
    if cursor.eat_keyword("OR") && !cursor.eat_keyword("REPLACE") {
        return Classification::new(StatementType::Other);
    }

    if cursor.eat_keyword("FUNCTION") {
        return Classification::new(StatementType::CreateFunction);
    }

    let unique = cursor.eat_keyword("UNIQUE");
    if cursor.eat_keyword("INDEX") {
        return classify_create_index(cursor);
    }
    if unique {
        return Classification::new(StatementType::Other);
    }

    // CREATE [TEMP | TEMPORARY | UNLOGGED] TABLE
    let _ = cursor.eat_keyword("TEMP")
        || cursor.eat_keyword("TEMPORARY")
        || cursor.eat_keyword("UNLOGGED");
    if !cursor.eat_keyword("TABLE") {
        return Classification::new(StatementType::Other);
    }
    eat_if_not_exists(&mut cursor);

    let mut result = Classification::new(StatementType::CreateTable);
    let Some(table) = cursor.identifier() else {
        return result;
    };
    result.references = extract_references(&sql[cursor.pos..]);
    result.table_name = Some(table);
    result
}

fn classify_create_index(mut cursor: Cursor<'_>) -> Classification {
    let mut result = Classification::new(StatementType::CreateIndex);

    let _ = cursor.eat_keyword("CONCURRENTLY");
    eat_if_not_exists(&mut cursor);

    // 인덱스 이름은 생략 가능
    if !cursor.eat_keyword("ON") && (cursor.identifier().is_none() || !cursor.eat_keyword("ON")) {
        return result;
    }
    let _ = cursor.eat_keyword("ONLY");

    result.table_name = cursor.identifier();
    result
}

fn classify_alter_table(sql: &str, mut cursor: Cursor<'_>) -> Classification {
    let mut result = Classification::new(StatementType::AlterTable);

    if cursor.eat_keyword("IF") && !cursor.eat_keyword("EXISTS") {
        return result;
    }
    let _ = cursor.eat_keyword("ONLY");

    let Some(table) = cursor.identifier() else {
        return result;
    };

    // FOREIGN KEY ... REFERENCES <table> 패턴만 의존성으로 기록
    let body = &sql[cursor.pos..];
    if let Some(fk_pos) = find_keyword(body, "FOREIGN", 0) {
        let mut fk = Cursor::at(body, fk_pos);
        fk.eat_keyword("FOREIGN");
        if fk.eat_keyword("KEY") {
            result.references = extract_references(&body[fk.pos..]);
        }
    }

    result.table_name = Some(table);
    result
}

fn eat_if_not_exists(cursor: &mut Cursor<'_>) {
    let save = cursor.pos;
    if !(cursor.eat_keyword("IF") && cursor.eat_keyword("NOT") && cursor.eat_keyword("EXISTS")) {
        cursor.pos = save;
    }
}

/// 본문에서 `REFERENCES <table>` 대상 테이블을 모두 추출합니다.
pub fn extract_references(body: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    let mut from = 0;

    while let Some(pos) = find_keyword(body, "REFERENCES", from) {
        let mut cursor = Cursor::at(body, pos);
        cursor.eat_keyword("REFERENCES");
        if let Some(table) = cursor.identifier() {
            if !refs.contains(&table) {
                refs.push(table);
            }
        }
        from = cursor.pos.max(pos + "REFERENCES".len());
    }

    refs
}

/// 식별자 정규화.
///
/// 따옴표 없는 이름은 소문자로, 따옴표 이름은 대소문자를 유지합니다.
/// 기본 스키마(`public.`) 접두어는 제거하고 다른 스키마는 그대로 둡니다.
pub fn normalize_identifier(parts: &[String]) -> String {
    match parts {
        [schema, table] if schema == DEFAULT_SCHEMA => table.clone(),
        _ => parts.join("."),
    }
}

/// `from` 이후에서 단어 경계를 만족하는 키워드 위치 (대소문자 무시)
fn find_keyword(haystack: &str, keyword: &str, from: usize) -> Option<usize> {
    let upper = haystack.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let mut start = from;

    while start <= upper.len() {
        let rel = upper.get(start..)?.find(keyword)?;
        let pos = start + rel;
        let end = pos + keyword.len();
        let before_ok = pos == 0 || !is_ident_byte(bytes[pos - 1]);
        let after_ok = end >= bytes.len() || !is_ident_byte(bytes[end]);
        if before_ok && after_ok {
            return Some(pos);
        }
        start = end;
    }

    None
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// 선두 키워드/식별자 판독용 커서
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn at(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    fn rest(&self) -> &'a str {
        self.src.get(self.pos..).unwrap_or("")
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    /// 대소문자 무시 키워드 매칭. 실패 시 위치를 바꾸지 않습니다.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let save = self.pos;
        self.skip_whitespace();

        let rest = self.rest();
        let matches = rest
            .get(..keyword.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
            && rest
                .as_bytes()
                .get(keyword.len())
                .map_or(true, |b| !is_ident_byte(*b));

        if matches {
            self.pos += keyword.len();
        } else {
            self.pos = save;
        }
        matches
    }

    /// `name`, `"Name"`, `schema.name` 형태의 식별자를 읽어 정규화합니다.
    fn identifier(&mut self) -> Option<String> {
        let save = self.pos;
        self.skip_whitespace();

        let mut parts = Vec::new();
        loop {
            let part = if self.peek() == Some('"') {
                self.quoted_part()
            } else {
                self.bare_part()
            };
            match part {
                Some(p) => parts.push(p),
                None => {
                    self.pos = save;
                    return None;
                }
            }
            if self.peek() == Some('.') {
                self.pos += 1;
                continue;
            }
            break;
        }

        Some(normalize_identifier(&parts))
    }

    fn bare_part(&mut self) -> Option<String> {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '$'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if len == 0 || rest.starts_with(|c: char| c.is_ascii_digit() || c == '$') {
            return None;
        }
        self.pos += len;
        Some(rest[..len].to_lowercase())
    }

    fn quoted_part(&mut self) -> Option<String> {
        let rest = self.rest();
        let mut name = String::new();
        let mut chars = rest.char_indices().skip(1).peekable();

        while let Some((i, c)) = chars.next() {
            if c == '"' {
                if let Some((_, '"')) = chars.peek() {
                    name.push('"');
                    chars.next();
                    continue;
                }
                if name.is_empty() {
                    return None;
                }
                self.pos += i + 1;
                return Some(name);
            }
            name.push(c);
        }

        None
    }
}
