//! Integration tests for the fixture loader.
//!
//! These tests write fixture templates into temporary directories and load
//! them through the in-memory factory.

use std::path::Path;

use fixture_loader::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn fixture_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        write(dir.path(), name, content);
    }
    dir
}

fn book_schema() -> Schema {
    Schema::new().relationship("book", "author", "author")
}

fn loader_for(dirs: &[&TempDir], schema: Schema) -> FixturesLoader<MemoryFactory> {
    let config = LoaderConfig::new(dirs.iter().map(|d| d.path()));
    FixturesLoader::new(MemoryFactory::new(schema), config)
}

#[test]
fn test_author_book_scenario() {
    let dir = fixture_dir(&[
        ("book.yml", "b1:\n  title: X\n  author: a1\n"),
        ("author.yml", "a1:\n  name: Ada\n"),
    ]);
    let mut loader = loader_for(&[&dir], book_schema());

    assert_eq!(loader.creation_order().unwrap(), ["author", "book"]);

    let mut seen = Vec::new();
    let mut progress = |reference: &Reference, _: &MemoryRecord, created: bool| {
        seen.push((reference.clone(), created));
    };
    let instances = loader.create_all(Some(&mut progress)).unwrap();

    assert_eq!(
        seen,
        [
            (Reference::new("author", "a1"), true),
            (Reference::new("book", "b1"), true),
        ]
    );
    assert_eq!(instances.keys().collect::<Vec<_>>(), ["a1", "b1"]);

    let author = &instances["a1"];
    let book = &instances["b1"];
    assert_eq!(author.fields["name"], json!("Ada"));
    assert_eq!(book.fields["title"], json!("X"));
    assert_eq!(book.fields["author"], json!(author.id));
    assert!(author.id < book.id);

    let committed: Vec<_> = loader.factory().records().map(|r| r.reference.clone()).collect();
    assert_eq!(committed.len(), 2);
}

#[test]
fn test_unknown_key_fails_before_creation() {
    let dir = fixture_dir(&[
        ("author.yml", "a1:\n  name: Ada\n"),
        ("book.yml", "b1:\n  title: X\n  author: unknown_key\n"),
    ]);
    let mut loader = loader_for(&[&dir], book_schema());

    let err = loader.create_all(None).unwrap_err();
    assert!(matches!(
        err.as_config(),
        Some(ConfigError::UnknownKey { target, .. }) if target == &Reference::new("author", "unknown_key")
    ));
    assert!(loader.instances().is_empty());
    assert_eq!(loader.factory().staged_count(), 0);
    assert_eq!(loader.factory().call_count(&Reference::new("author", "a1")), 0);
}

#[test]
fn test_unknown_class_fails_before_creation() {
    let dir = fixture_dir(&[("book.yml", "b1:\n  author: a1\n")]);
    let mut loader = loader_for(&[&dir], book_schema());

    let err = loader.create_all(None).unwrap_err();
    assert!(matches!(
        err.as_config(),
        Some(ConfigError::UnknownClass { class_name, .. }) if class_name == "author"
    ));
}

#[test]
fn test_cycle_fails_before_factory() {
    let dir = fixture_dir(&[
        ("author.yml", "a1:\n  favorite: b1\n"),
        ("book.yml", "b1:\n  author: a1\n"),
    ]);
    let schema = book_schema().relationship("author", "favorite", "book");
    let mut loader = loader_for(&[&dir], schema);

    let err = loader.create_all(None).unwrap_err();
    let Some(ConfigError::CircularDependency { edges }) = err.as_config() else {
        panic!("expected a cycle error, got {err}");
    };
    assert!(edges.contains(&("author".to_string(), "book".to_string())));
    assert!(edges.contains(&("book".to_string(), "author".to_string())));
    assert_eq!(loader.factory().call_count(&Reference::new("author", "a1")), 0);
    assert_eq!(loader.factory().staged_count(), 0);
}

#[test]
fn test_later_file_wins() {
    let first = fixture_dir(&[("author.yml", "a1:\n  name: Ada\na2:\n  name: Alan\n")]);
    let second = fixture_dir(&[("author.yml", "a1:\n  name: Grace\n")]);
    let mut loader = loader_for(&[&first, &second], Schema::new());

    let instances = loader.create_all(None).unwrap();
    assert_eq!(instances.len(), 2);
    assert_eq!(instances["a1"].fields["name"], json!("Grace"));
    assert_eq!(
        loader.factory().records().filter(|r| r.reference.key == "a1").count(),
        1
    );
}

#[test]
fn test_overwritten_reference_adds_no_dependency() {
    let first = fixture_dir(&[("author.yml", "a1:\n  favorite: b1\n")]);
    let second = fixture_dir(&[
        ("author.yml", "a1:\n  favorite: ~\n"),
        ("book.yml", "b1:\n  author: a1\n"),
    ]);
    let schema = book_schema().relationship("author", "favorite", "book");
    let mut loader = loader_for(&[&first, &second], schema);
    loader.load().unwrap();

    assert_eq!(
        loader.fixture(&Reference::new("author", "a1")).unwrap()["favorite"],
        FieldValue::Reference(None)
    );
    assert!(loader.relationships()["author"].is_empty());
    assert_eq!(loader.creation_order().unwrap(), ["author", "book"]);

    let instances = loader.create_all(None).unwrap();
    assert_eq!(instances["b1"].fields["author"], json!(instances["a1"].id));
    assert_eq!(instances["a1"].fields["favorite"], json!(null));
}

#[test]
fn test_strict_duplicates() {
    let first = fixture_dir(&[("author.yml", "a1:\n  name: Ada\n")]);
    let second = fixture_dir(&[("fixtures.yml", "author:\n  a1:\n    name: Grace\n")]);
    let config = LoaderConfig::new([first.path(), second.path()]).with_strict_duplicates(true);
    let mut loader = FixturesLoader::new(MemoryFactory::new(Schema::new()), config);

    let err = loader.load().unwrap_err();
    assert!(matches!(
        err.as_config(),
        Some(ConfigError::DuplicateKey { reference, .. }) if reference == &Reference::new("author", "a1")
    ));
}

#[test]
fn test_multi_and_single_class_files_merge() {
    let dir = fixture_dir(&[
        (
            "fixtures.yml",
            "author:\n  a1:\n    name: Ada\ntag:\n  t1:\n    label: Rust\n  t2:\n    label: Go\n",
        ),
        ("book.yml", "b1:\n  author: a1\n  tags: [t1]\n"),
        ("notes.md", "# not a fixture\n"),
        ("empty.yml", "# nothing here yet\n"),
    ]);
    let schema = book_schema().relationship("book", "tags", "tag");
    let mut loader = loader_for(&[&dir], schema);
    loader.load().unwrap();

    let classes: Vec<_> = loader.fixtures().keys().map(String::as_str).collect();
    assert_eq!(classes.len(), 3);
    assert!(!classes.contains(&"empty"));
    assert!(!classes.contains(&"notes"));

    let book = loader.fixture(&Reference::new("book", "b1")).unwrap();
    assert_eq!(
        book["tags"],
        FieldValue::References(vec![Reference::new("tag", "t1")])
    );
    assert_eq!(
        book["author"],
        FieldValue::Reference(Some(Reference::new("author", "a1")))
    );

    let order = loader.creation_order().unwrap();
    let position = |c: &str| order.iter().position(|o| o == c).unwrap();
    assert!(position("author") < position("book"));
    assert!(position("tag") < position("book"));
}

#[test]
fn test_random_pickers_see_every_file() {
    // `article` renders before `zebra` but can still pick zebra keys
    let dir = fixture_dir(&[
        (
            "article.yml",
            "{% for i in range(end=5) %}\nart{{ i }}:\n  subject: {{ random_model(class_name=\"zebra\") }}\n  related: {{ random_models(class_name=\"article\", count=2) }}\n{% endfor %}\n",
        ),
        ("zebra.yml", "z1:\n  stripes: 10\nz2:\n  stripes: 12\n"),
    ]);
    let schema = Schema::new().relationship("article", "subject", "zebra");
    let mut loader = loader_for(&[&dir], schema);
    loader.load().unwrap();

    let articles = &loader.fixtures()["article"];
    assert_eq!(articles.len(), 5);
    for data in articles.values() {
        let FieldValue::Reference(Some(subject)) = &data["subject"] else {
            panic!("subject should be a single reference, got {:?}", data["subject"]);
        };
        assert_eq!(subject.class_name, "zebra");
        assert!(["z1", "z2"].contains(&subject.key.as_str()));

        // not a reference field, but picked from the file being rendered
        let related = data["related"].as_literal().unwrap().as_array().unwrap();
        assert_eq!(related.len(), 2);
        for key in related {
            assert!(articles.contains_key(key.as_str().unwrap()));
        }
    }

    loader.create_all(None).unwrap();
}

#[test]
fn test_materialization_is_reproducible() {
    let files = [
        ("author.yml", "{% for i in range(end=4) %}\na{{ i }}:\n  name: \"{{ fake(kind=\"name\") }}\"\n  born: {{ fake(kind=\"number\", min=1900, max=2000) }}\n{% endfor %}\n"),
        ("book.yml", "{% for i in range(end=6) %}\nb{{ i }}:\n  author: {{ random_model(class_name=\"author\") }}\n  title: \"{{ fake(kind=\"sentence\") }}\"\n{% endfor %}\n"),
    ];
    let first_dir = fixture_dir(&files);
    let second_dir = fixture_dir(&files);

    let mut first = loader_for(&[&first_dir], book_schema());
    let mut second = loader_for(&[&second_dir], book_schema());
    first.load().unwrap();
    second.load().unwrap();

    assert_eq!(first.fixtures(), second.fixtures());
    assert_eq!(first.fixtures()["book"].len(), 6);
}

#[test]
fn test_convert_identifiers_reuses_records() {
    let dir = fixture_dir(&[
        ("author.yml", "a1:\n  name: Ada\na2:\n  name: Alan\n"),
        ("book.yml", "b1:\n  author: a1\n"),
    ]);
    let mut loader = loader_for(&[&dir], book_schema());
    let instances = loader.create_all(None).unwrap();

    let a1 = Reference::new("author", "a1");
    let converted = loader.convert_identifiers(a1.clone()).unwrap();
    assert_eq!(converted, Instances::One(instances["a1"].clone()));
    assert_eq!(loader.factory().call_count(&a1), 2);

    let many = loader
        .convert_identifiers(vec![a1.clone(), Reference::new("author", "a2")])
        .unwrap()
        .into_vec();
    assert_eq!(many.len(), 2);
    assert_eq!(many[1].id, instances["a2"].id);

    let book_author = loader.fixture(&Reference::new("book", "b1")).unwrap()["author"].clone();
    let author = loader.convert_field(&book_author).unwrap().one().unwrap();
    assert_eq!(author.id, instances["a1"].id);
}

#[test]
fn test_convert_identifiers_rejects_bad_input() {
    let dir = fixture_dir(&[("author.yml", "a1:\n  name: Ada\n")]);
    let mut loader = loader_for(&[&dir], Schema::new());
    loader.create_all(None).unwrap();

    let empty = loader.convert_identifiers(Vec::<Reference>::new());
    assert!(matches!(empty, Err(FixtureError::InvalidIdentifiers(_))));

    let literal = loader.convert_field(&FieldValue::Literal(json!("a1")));
    assert!(matches!(literal, Err(FixtureError::InvalidIdentifiers(_))));

    // nothing is resolved when one identifier is unknown
    let before = loader.factory().call_count(&Reference::new("author", "a1"));
    let unknown = loader.convert_identifiers(vec![
        Reference::new("author", "a1"),
        Reference::new("author", "nobody"),
    ]);
    assert!(matches!(unknown, Err(FixtureError::InvalidIdentifiers(_))));
    assert_eq!(
        loader.factory().call_count(&Reference::new("author", "a1")),
        before
    );
}

#[test]
fn test_bare_key_on_untyped_field_is_config_error() {
    let dir = fixture_dir(&[
        ("author.yml", "a1:\n  name: Ada\n"),
        ("review.yml", "r1:\n  subject: a1\n"),
    ]);
    let schema: Schema = serde_yaml::from_str("review:\n  subject: ~\n").unwrap();
    let mut loader = loader_for(&[&dir], schema);

    let err = loader.load().unwrap_err();
    assert!(matches!(
        err.as_config(),
        Some(ConfigError::UnresolvableReference { field, .. }) if field == "subject"
    ));
}

#[test]
fn test_explicit_reference_on_untyped_field() {
    let dir = fixture_dir(&[
        ("author.yml", "a1:\n  name: Ada\n"),
        ("review.yml", "r1:\n  subject: author(a1)\n"),
    ]);
    let schema: Schema = serde_yaml::from_str("review:\n  subject: ~\n").unwrap();
    let mut loader = loader_for(&[&dir], schema);

    let instances = loader.create_all(None).unwrap();
    assert_eq!(instances["r1"].fields["subject"], json!(instances["a1"].id));
    assert_eq!(loader.creation_order().unwrap(), ["author", "review"]);
}

#[test]
fn test_template_errors_name_the_file() {
    let dir = fixture_dir(&[("author.yml", "a1:\n  name: {{ fake(kind=\"horoscope\") }}\n")]);
    let mut loader = loader_for(&[&dir], Schema::new());

    let err = loader.load().unwrap_err();
    assert!(matches!(err, FixtureError::Template { ref template, .. } if template.ends_with("author.yml")));
    assert!(err.to_string().contains("horoscope"));
}

#[test]
fn test_hash_password_helper() {
    let dir = fixture_dir(&[(
        "user.yml",
        "u1:\n  password: \"{{ hash_password(value=\"secret\") }}\"\n",
    )]);
    let mut loader = loader_for(&[&dir], Schema::new());
    let instances = loader.create_all(None).unwrap();

    let hash = instances["u1"].fields["password"].as_str().unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(!hash.contains("secret"));
}

/// Fails on one record, otherwise delegates to [`MemoryFactory`].
struct FailingFactory {
    inner: MemoryFactory,
    fail_on: Reference,
    commits: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("refusing to create {0}")]
struct Refused(Reference);

impl Factory for FailingFactory {
    type Instance = MemoryRecord;
    type Error = Refused;

    fn get_relationships(&self, class_name: &str) -> Relationships {
        self.inner.get_relationships(class_name)
    }

    fn create_or_update(
        &mut self,
        identifier: &Reference,
        data: &RawRecordData,
        instances: &InstanceCache<MemoryRecord>,
    ) -> Result<(MemoryRecord, bool), Refused> {
        if identifier == &self.fail_on {
            return Err(Refused(identifier.clone()));
        }
        self.inner
            .create_or_update(identifier, data, instances)
            .map_err(|_| Refused(identifier.clone()))
    }

    fn commit(&mut self) -> Result<(), Refused> {
        self.commits += 1;
        Ok(())
    }
}

#[test]
fn test_factory_errors_propagate_without_commit() {
    let dir = fixture_dir(&[
        ("author.yml", "a1:\n  name: Ada\n"),
        ("book.yml", "b1:\n  author: a1\nb2:\n  author: a1\n"),
    ]);
    let factory = FailingFactory {
        inner: MemoryFactory::new(book_schema()),
        fail_on: Reference::new("book", "b1"),
        commits: 0,
    };
    let mut loader = FixturesLoader::new(factory, LoaderConfig::new([dir.path()]));

    let err = loader.create_all(None).unwrap_err();
    assert!(matches!(err, FixtureError::Factory(_)));
    assert_eq!(err.to_string(), "Factory error: refusing to create book(b1)");
    assert_eq!(loader.factory().commits, 0);
    assert!(loader.instances().contains(&Reference::new("author", "a1")));
    assert!(!loader.instances().contains(&Reference::new("book", "b2")));
}

#[test]
fn test_declared_keys_helper_in_templates() {
    let dir = fixture_dir(&[
        ("author.yml", "a1:\n  name: Ada\na2:\n  name: Alan\n"),
        (
            "book.yml",
            "{% for a in declared_keys(class_name=\"author\") %}\nbook_{{ a }}:\n  author: {{ a }}\n{% endfor %}\n",
        ),
    ]);
    let mut loader = loader_for(&[&dir], book_schema());
    loader.load().unwrap();

    // discovery renders the loop empty, so only the second pass declares books
    let books: Vec<_> = loader.fixtures()["book"].keys().map(String::as_str).collect();
    assert_eq!(books, ["book_a1", "book_a2"]);

    let instances = loader.create_all(None).unwrap();
    assert_eq!(instances["book_a2"].fields["author"], json!(instances["a2"].id));
}

#[test]
fn test_parenthesized_key_on_typed_field() {
    let dir = fixture_dir(&[
        ("author.yml", "smith(jr):\n  name: John Smith Jr.\n"),
        ("book.yml", "b1:\n  author: smith(jr)\n"),
    ]);
    let mut loader = loader_for(&[&dir], book_schema());

    let instances = loader.create_all(None).unwrap();
    assert_eq!(
        instances["b1"].fields["author"],
        json!(instances["smith(jr)"].id)
    );
}
