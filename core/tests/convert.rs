//! End-to-end conversion tests: MySQL text in, PostgreSQL text out.

use pretty_assertions::assert_eq;
use sqlbridge_core::batch::convert_batch;

fn convert(sql: &str) -> String {
    convert_batch(sql).sql
}

#[test]
fn test_ifnull_becomes_coalesce() {
    assert_eq!(
        convert("SELECT IFNULL(comment, 'No Comment') FROM grades;"),
        "SELECT COALESCE(comment, 'No Comment') FROM grades;\n"
    );
}

#[test]
fn test_if_becomes_case() {
    let out = convert("SELECT IF(score >= 60, 'pass', 'fail') FROM grades;");
    assert_eq!(
        out,
        "SELECT CASE WHEN score >= 60 THEN 'pass' ELSE 'fail' END FROM grades;\n"
    );
}

#[test]
fn test_concat_becomes_operator_chain() {
    let out = convert("SELECT CONCAT(first, ' ', last) FROM people;");
    assert!(out.contains("first || ' ' || last"), "got: {out}");
}

#[test]
fn test_group_concat_becomes_string_agg() {
    let out = convert("SELECT GROUP_CONCAT(name SEPARATOR '; ') FROM tags;");
    assert!(out.contains("STRING_AGG(name, '; ')"), "got: {out}");

    let defaulted = convert("SELECT GROUP_CONCAT(name) FROM tags;");
    assert!(defaulted.contains("STRING_AGG(name, ',')"), "got: {defaulted}");
}

#[test]
fn test_date_add_becomes_interval_arithmetic() {
    let out = convert("SELECT DATE_ADD(created_at, INTERVAL 7 DAY) FROM orders;");
    assert!(out.contains("created_at + INTERVAL '7 day'"), "got: {out}");

    let sub = convert("SELECT DATE_SUB(created_at, INTERVAL 1 MONTH) FROM orders;");
    assert!(sub.contains("created_at - INTERVAL '1 month'"), "got: {sub}");
}

#[test]
fn test_unix_timestamp_becomes_epoch_extraction() {
    let out = convert("SELECT UNIX_TIMESTAMP(created_at) FROM orders;");
    assert!(
        out.contains("CAST(EXTRACT(EPOCH FROM created_at) AS BIGINT)"),
        "got: {out}"
    );
}

#[test]
fn test_date_format_becomes_to_char() {
    let out = convert("SELECT DATE_FORMAT(created_at, '%Y-%m-%d') FROM orders;");
    assert!(out.contains("TO_CHAR(created_at, 'YYYY-MM-DD')"), "got: {out}");
}

#[test]
fn test_unknown_format_token_is_an_error() {
    let out = convert("SELECT DATE_FORMAT(created_at, '%Y-%q') FROM orders;");
    assert!(out.contains("-- ERROR:"), "got: {out}");
    assert!(out.contains("%q"), "got: {out}");
}

#[test]
fn test_json_path_is_decomposed() {
    let out = convert("SELECT JSON_EXTRACT(doc, '$.address.city') FROM users;");
    assert!(out.contains("doc -> 'address' -> 'city'"), "got: {out}");

    let unquoted = convert("SELECT JSON_UNQUOTE(JSON_EXTRACT(doc, '$.address.city')) FROM users;");
    assert!(
        unquoted.contains("doc -> 'address' ->> 'city'"),
        "got: {unquoted}"
    );
}

#[test]
fn test_regexp_becomes_tilde() {
    let out = convert("SELECT 1 FROM t WHERE name REGEXP '^a';");
    assert!(out.contains("name ~ '^a'"), "got: {out}");
}

#[test]
fn test_backticks_become_double_quotes() {
    let out = convert("SELECT `order` FROM `select`;");
    assert_eq!(out, "SELECT \"order\" FROM \"select\";\n");
}

#[test]
fn test_aliases_are_requoted() {
    assert_eq!(
        convert("SELECT a AS `order` FROM t AS `group`;"),
        "SELECT a AS \"order\" FROM t AS \"group\";\n"
    );
}

#[test]
fn test_comma_limit_swaps_arguments() {
    let out = convert("SELECT * FROM t LIMIT 20, 10;");
    assert!(out.contains("LIMIT 10 OFFSET 20"), "got: {out}");
}

#[test]
fn test_untranslatable_function_is_an_error() {
    let out = convert("SELECT FOUND_ROWS();");
    assert!(out.contains("-- ERROR:"), "got: {out}");
    assert!(out.contains("-- SELECT FOUND_ROWS()"), "got: {out}");
}

#[test]
fn test_inline_keys_become_standalone_indexes() {
    let out = convert(
        "CREATE TABLE users (\
           id INT PRIMARY KEY,\
           email VARCHAR(100),\
           name VARCHAR(50),\
           KEY idx_email (email),\
           KEY (name(10)),\
           UNIQUE KEY uq_name (name)\
         );",
    );
    assert_eq!(out.matches("CREATE INDEX").count(), 2, "got: {out}");
    assert!(out.contains("CREATE INDEX idx_email ON users (email)"), "got: {out}");
    // The unnamed key gets a synthesized name and loses its prefix length.
    assert!(out.contains("CREATE INDEX idx_users_1 ON users (name)"), "got: {out}");
    assert!(out.contains("-- TODO: index prefix length"), "got: {out}");
    // PRIMARY KEY and UNIQUE stay inline.
    assert!(out.contains("CONSTRAINT uq_name UNIQUE (name)"), "got: {out}");
}

#[test]
fn test_fulltext_becomes_gin_index() {
    let out = convert(
        "CREATE TABLE posts (id INT, body TEXT, FULLTEXT KEY ft_body (body));",
    );
    assert_eq!(out.matches("USING GIN").count(), 1, "got: {out}");
    assert!(
        out.contains(
            "CREATE INDEX ft_body ON posts USING GIN (to_tsvector('simple', COALESCE(body::text, '')))"
        ),
        "got: {out}"
    );
    assert!(!out.contains("FULLTEXT"), "got: {out}");
}

#[test]
fn test_type_mapping() {
    let out = convert(
        "CREATE TABLE t (\
           a INT UNSIGNED,\
           b BIGINT UNSIGNED,\
           c DATETIME,\
           d JSON,\
           e TINYINT,\
           f MEDIUMTEXT,\
           g BLOB\
         );",
    );
    assert!(out.contains("a BIGINT"), "got: {out}");
    assert!(out.contains("b NUMERIC(20,0)"), "got: {out}");
    assert!(out.contains("c TIMESTAMP"), "got: {out}");
    assert!(out.contains("d JSONB"), "got: {out}");
    assert!(out.contains("e SMALLINT"), "got: {out}");
    assert!(out.contains("f TEXT"), "got: {out}");
    assert!(out.contains("g BYTEA"), "got: {out}");
}

#[test]
fn test_enum_becomes_text_with_check() {
    let out = convert("CREATE TABLE t (status ENUM('new', 'done'));");
    assert!(out.contains("status TEXT"), "got: {out}");
    assert!(
        out.contains("CONSTRAINT chk_t_status CHECK (status IN ('new', 'done'))"),
        "got: {out}"
    );
}

#[test]
fn test_auto_increment_becomes_identity() {
    let out = convert("CREATE TABLE t (id INT AUTO_INCREMENT PRIMARY KEY);");
    assert!(out.contains("GENERATED BY DEFAULT AS IDENTITY"), "got: {out}");
    assert!(!out.to_uppercase().contains("AUTO_INCREMENT"), "got: {out}");
}

#[test]
fn test_table_options_are_stripped() {
    let out = convert("CREATE TABLE t (id INT) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;");
    assert!(!out.contains("ENGINE"), "got: {out}");
    assert!(!out.contains("CHARSET"), "got: {out}");
}

#[test]
fn test_on_update_current_timestamp_leaves_a_todo() {
    let out = convert(
        "CREATE TABLE t (updated_at TIMESTAMP ON UPDATE CURRENT_TIMESTAMP);",
    );
    assert!(out.contains("-- TODO: column updated_at had ON UPDATE"), "got: {out}");
    assert!(out.contains("trigger"), "got: {out}");
    let create = out
        .lines()
        .find(|l| l.starts_with("CREATE TABLE"))
        .expect("create table line");
    assert!(!create.contains("ON UPDATE"), "got: {create}");
}

#[test]
fn test_generated_column_division_is_guarded() {
    let out = convert(
        "CREATE TABLE t (total INT, n INT, avg_val INT GENERATED ALWAYS AS (total / n) STORED);",
    );
    assert!(
        out.contains("CAST(total AS NUMERIC) / NULLIF(n, 0)"),
        "got: {out}"
    );
}

#[test]
fn test_alter_table_add_enum_column() {
    let out = convert("ALTER TABLE t ADD COLUMN status ENUM('new', 'done');");
    assert!(out.contains("ADD COLUMN status TEXT"), "got: {out}");
    assert!(
        out.contains(
            "ALTER TABLE t ADD CONSTRAINT chk_t_status CHECK (status IN ('new', 'done'));"
        ),
        "got: {out}"
    );
}

#[test]
fn test_alter_table_modify_is_annotated() {
    let out = convert("ALTER TABLE t MODIFY COLUMN a BIGINT;");
    assert!(out.contains("-- TODO:"), "got: {out}");
    assert!(out.contains("ALTER COLUMN"), "got: {out}");
}

#[test]
fn test_alter_table_change_is_annotated() {
    let out = convert("ALTER TABLE t CHANGE COLUMN a b BIGINT;");
    assert!(out.contains("-- TODO:"), "got: {out}");
    assert!(out.contains("RENAME COLUMN"), "got: {out}");
    assert!(out.contains("-- ALTER TABLE t CHANGE COLUMN a b BIGINT"), "got: {out}");
}

#[test]
fn test_alter_table_add_index_is_extracted() {
    assert_eq!(
        convert("ALTER TABLE t ADD INDEX idx_a (a);"),
        "CREATE INDEX idx_a ON t (a);\n"
    );
}

#[test]
fn test_insert_ignore_becomes_on_conflict_do_nothing() {
    assert_eq!(
        convert("INSERT IGNORE INTO t (a) VALUES (1);"),
        "INSERT INTO t (a) VALUES (1) ON CONFLICT DO NOTHING;\n"
    );
}

#[test]
fn test_replace_into_is_annotated_and_commented_out() {
    let out = convert("REPLACE INTO t (a) VALUES (1);");
    assert!(out.contains("-- TODO:"), "got: {out}");
    assert!(out.contains("-- REPLACE INTO t (a) VALUES (1)"), "got: {out}");
    assert!(!out.lines().any(|l| l.starts_with("REPLACE")), "got: {out}");
}

#[test]
fn test_on_duplicate_key_update_is_annotated() {
    let out = convert("INSERT INTO t (a) VALUES (1) ON DUPLICATE KEY UPDATE a = 2;");
    assert!(out.contains("-- TODO:"), "got: {out}");
    assert!(out.contains("conflict target"), "got: {out}");
    assert!(
        out.contains("-- INSERT INTO t (a) VALUES (1) ON DUPLICATE KEY UPDATE a = 2"),
        "got: {out}"
    );
}

#[test]
fn test_update_join_becomes_from_where() {
    let out = convert(
        "UPDATE orders JOIN customers ON orders.customer_id = customers.id \
         SET orders.region = customers.region WHERE customers.active = 1;",
    );
    assert!(
        out.contains(
            "UPDATE orders SET region = customers.region FROM customers \
             WHERE orders.customer_id = customers.id AND customers.active = 1"
        ),
        "got: {out}"
    );
}

#[test]
fn test_update_outer_join_is_annotated() {
    let out = convert(
        "UPDATE a LEFT JOIN b ON a.id = b.id SET a.x = 1;",
    );
    assert!(out.contains("-- TODO:"), "got: {out}");
    assert!(out.contains("outer join"), "got: {out}");
}

#[test]
fn test_delete_limit_becomes_ctid_subquery() {
    let out = convert("DELETE FROM logs WHERE level = 'debug' LIMIT 10;");
    assert!(
        out.contains("ctid IN (SELECT ctid FROM logs WHERE level = 'debug' LIMIT 10)"),
        "got: {out}"
    );
}

#[test]
fn test_delete_limit_keeps_order_by() {
    let out = convert("DELETE FROM logs ORDER BY created_at LIMIT 5;");
    assert!(
        out.contains("SELECT ctid FROM logs ORDER BY created_at LIMIT 5"),
        "got: {out}"
    );
}

#[test]
fn test_delete_without_limit_is_untouched() {
    assert_eq!(
        convert("DELETE FROM logs WHERE level = 'debug';"),
        "DELETE FROM logs WHERE level = 'debug';\n"
    );
}

#[test]
fn test_malformed_statement_does_not_abort_the_batch() {
    let out = convert("THIS IS NOT SQL; SELECT IFNULL(a, 0) FROM t;");
    let blocks: Vec<&str> = out.trim_end().split("\n\n").collect();
    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].starts_with("-- ERROR:"), "got: {out}");
    assert!(blocks[0].contains("-- THIS IS NOT SQL"), "got: {out}");
    assert_eq!(blocks[1], "SELECT COALESCE(a, 0) FROM t;");
}

#[test]
fn test_comments_stay_with_their_statement() {
    let out = convert("-- the grades table\nSELECT 1 FROM grades;\n# trailing note\n");
    assert!(
        out.contains("-- the grades table\nSELECT 1 FROM grades;"),
        "got: {out}"
    );
    assert!(out.contains("-- trailing note"), "got: {out}");
}

#[test]
fn test_expression_rewrite_is_idempotent() {
    let once = convert("SELECT IFNULL(comment, 'No Comment') FROM grades;");
    let twice = convert(&once);
    assert_eq!(once, twice);

    let limit_once = convert("SELECT * FROM t LIMIT 20, 10;");
    let limit_twice = convert(&limit_once);
    assert_eq!(limit_once, limit_twice);
}

#[test]
fn test_index_names_restart_per_batch() {
    let sql = "CREATE TABLE a (x INT, KEY (x));";
    let first = convert(sql);
    let second = convert(sql);
    assert_eq!(first, second);
    assert!(first.contains("idx_a_1"), "got: {first}");
}
