//! Functions exposed to fixture templates.
//!
//! Tera only passes named arguments, so templates call these as
//! `random_model(class_name="author")`, `random_models(class_name="tag", count=2)`,
//! `declared_keys(class_name="author")`, `hash_password(value="secret")` and
//! `fake(kind="name")`.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use fake::Fake;
use fake::faker::address::en::{CityName, CountryName, StreetName, ZipCode};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::lorem::en::{Paragraph, Sentence, Word};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tera::Value;

pub const RANDOM_MODEL: &str = "random_model";
pub const RANDOM_MODELS: &str = "random_models";
pub const DECLARED_KEYS: &str = "declared_keys";
pub const HASH_PASSWORD: &str = "hash_password";
pub const FAKE: &str = "fake";

/// Class name to every key declared for it, in declaration order.
pub type DeclaredKeys = IndexMap<String, Vec<String>>;

pub(crate) type Shared<T> = Arc<Mutex<T>>;

pub(crate) fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State behind the random reference pickers.
#[derive(Debug)]
pub(crate) struct PickerState {
    pub(crate) keys: DeclaredKeys,
    pub(crate) rng: StdRng,
    pub(crate) default_range: RangeInclusive<usize>,
}

impl PickerState {
    pub(crate) fn new(seed: u64, default_range: RangeInclusive<usize>) -> Self {
        Self {
            keys: DeclaredKeys::new(),
            rng: StdRng::seed_from_u64(seed),
            default_range,
        }
    }
}

fn str_arg<'a>(args: &'a HashMap<String, Value>, func: &str, name: &str) -> tera::Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg(format!("`{func}` requires a string `{name}` argument")))
}

fn opt_usize_arg(args: &HashMap<String, Value>, func: &str, name: &str) -> tera::Result<Option<usize>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| tera::Error::msg(format!("`{func}` expects a non-negative integer `{name}`"))),
    }
}

fn opt_i64_arg(args: &HashMap<String, Value>, func: &str, name: &str) -> tera::Result<Option<i64>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| tera::Error::msg(format!("`{func}` expects an integer `{name}`"))),
    }
}

/// Picks one declared key of `class_name`, or null when the class has none.
pub(crate) fn random_model(state: Shared<PickerState>) -> impl tera::Function {
    move |args: &HashMap<String, Value>| -> tera::Result<Value> {
        let class_name = str_arg(args, RANDOM_MODEL, "class_name")?;
        let mut guard = lock(&state);
        let PickerState { keys, rng, .. } = &mut *guard;

        Ok(keys
            .get(class_name)
            .and_then(|keys| keys.choose(rng))
            .map(|key| Value::String(key.clone()))
            .unwrap_or(Value::Null))
    }
}

/// Picks distinct declared keys of `class_name`.
///
/// `count` fixes the number; otherwise it is drawn from `min..=max`, falling
/// back to the configured default range. Never picks more keys than exist.
pub(crate) fn random_models(state: Shared<PickerState>) -> impl tera::Function {
    move |args: &HashMap<String, Value>| -> tera::Result<Value> {
        let class_name = str_arg(args, RANDOM_MODELS, "class_name")?;
        let count = opt_usize_arg(args, RANDOM_MODELS, "count")?;
        let min = opt_usize_arg(args, RANDOM_MODELS, "min")?;
        let max = opt_usize_arg(args, RANDOM_MODELS, "max")?;

        let mut guard = lock(&state);
        let PickerState {
            keys,
            rng,
            default_range,
        } = &mut *guard;

        let Some(keys) = keys.get(class_name) else {
            return Ok(Value::Array(Vec::new()));
        };

        let count = match count {
            Some(count) => count,
            None => {
                let min = min.unwrap_or(*default_range.start());
                let max = max.unwrap_or(*default_range.end()).max(min);
                rng.gen_range(min..=max)
            }
        };

        Ok(Value::Array(
            keys.choose_multiple(rng, count.min(keys.len()))
                .map(|key| Value::String(key.clone()))
                .collect(),
        ))
    }
}

/// Every declared key of `class_name`, in declaration order.
pub(crate) fn declared_keys(state: Shared<PickerState>) -> impl tera::Function {
    move |args: &HashMap<String, Value>| -> tera::Result<Value> {
        let class_name = str_arg(args, DECLARED_KEYS, "class_name")?;
        let keys = lock(&state)
            .keys
            .get(class_name)
            .map(|keys| keys.iter().cloned().map(Value::String).collect())
            .unwrap_or_default();
        Ok(Value::Array(keys))
    }
}

/// Discovery-pass stand-in for [`random_model`].
pub(crate) fn no_model(_args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::Null)
}

/// Discovery-pass stand-in for [`random_models`] and [`declared_keys`].
pub(crate) fn no_models(_args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::Array(Vec::new()))
}

/// Hashes a password into an argon2 PHC string.
///
/// The salt comes from `rng`, so a seeded generator gives reproducible hashes.
pub fn hash_password(password: &str, rng: &mut StdRng) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(rng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub(crate) fn hash_password_fn(rng: Shared<StdRng>) -> impl tera::Function {
    move |args: &HashMap<String, Value>| -> tera::Result<Value> {
        let value = str_arg(args, HASH_PASSWORD, "value")?;
        let hash = hash_password(value, &mut lock(&rng))
            .map_err(|e| tera::Error::msg(format!("Failed to hash password: {e}")))?;
        Ok(Value::String(hash))
    }
}

/// Produces one synthetic value of the requested kind.
pub fn fake_value(kind: &str, args: &HashMap<String, Value>, rng: &mut StdRng) -> tera::Result<Value> {
    let value = match kind {
        "name" => Value::String(Name().fake_with_rng(rng)),
        "first_name" => Value::String(FirstName().fake_with_rng(rng)),
        "last_name" => Value::String(LastName().fake_with_rng(rng)),
        "email" => Value::String(SafeEmail().fake_with_rng(rng)),
        "username" => Value::String(Username().fake_with_rng(rng)),
        "word" => Value::String(Word().fake_with_rng(rng)),
        "sentence" => Value::String(Sentence(4..10).fake_with_rng(rng)),
        "paragraph" => Value::String(Paragraph(2..5).fake_with_rng(rng)),
        "city" => Value::String(CityName().fake_with_rng(rng)),
        "country" => Value::String(CountryName().fake_with_rng(rng)),
        "street" => Value::String(StreetName().fake_with_rng(rng)),
        "zip" => Value::String(ZipCode().fake_with_rng(rng)),
        "company" => Value::String(CompanyName().fake_with_rng(rng)),
        "phone" => Value::String(PhoneNumber().fake_with_rng(rng)),
        "uuid" => Value::String(
            uuid::Builder::from_random_bytes(rng.r#gen())
                .into_uuid()
                .to_string(),
        ),
        "bool" => Value::Bool(rng.gen_bool(0.5)),
        "number" => {
            let min = opt_i64_arg(args, FAKE, "min")?.unwrap_or(0);
            let max = opt_i64_arg(args, FAKE, "max")?.unwrap_or(100);
            if min > max {
                return Err(tera::Error::msg(format!(
                    "`fake(kind=\"number\")` got min {min} greater than max {max}"
                )));
            }
            Value::from(rng.gen_range(min..=max))
        }
        other => {
            return Err(tera::Error::msg(format!("`fake` does not know kind `{other}`")));
        }
    };
    Ok(value)
}

pub(crate) fn fake_fn(rng: Shared<StdRng>) -> impl tera::Function {
    move |args: &HashMap<String, Value>| -> tera::Result<Value> {
        let kind = str_arg(args, FAKE, "kind")?;
        fake_value(kind, args, &mut lock(&rng))
    }
}
