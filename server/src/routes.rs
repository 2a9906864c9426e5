//! Read-only HTTP surface.
//!
//! Handlers only ever query the live generation through the store and the
//! live index uids; a refresh in progress is invisible here.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use grimoire_model::{EntityKind, Language, Record, RecordKey, TableName};

use crate::error::ApiError;
use crate::state::AppState;

const MAX_PAGE_SIZE: usize = 96;
const MAX_SEARCH_LIMIT: usize = 50;
const MAX_RANGE_DAYS: i64 = 100;

fn parse_lang(code: &str) -> Result<Language, ApiError> {
    Language::parse(code).ok_or(ApiError::UnknownLanguage)
}

#[derive(Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_page_size")]
    page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    24
}

#[derive(Deserialize)]
pub struct SearchParams {
    q: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    8
}

#[derive(Deserialize)]
pub struct LevelParam {
    level: Option<i32>,
}

#[derive(Deserialize)]
pub struct RangeParams {
    from: NaiveDate,
    to: NaiveDate,
    level: Option<i32>,
}

/// Flattens localized fields down to the requested language.
fn render_record(record: &Record, lang: Language, player_level: Option<i32>) -> Value {
    match record {
        Record::Item(item) => json!({
            "ankama_id": item.ankama_id,
            "name": item.name.get(lang),
            "description": item.description.get(lang),
            "category": item.category,
            "level": item.level,
        }),
        Record::Set(set) => json!({
            "ankama_id": set.ankama_id,
            "name": set.name.get(lang),
            "level": set.level,
            "item_ids": set.item_ids,
        }),
        Record::Mount(mount) => json!({
            "ankama_id": mount.ankama_id,
            "name": mount.name.get(lang),
            "family": mount.family,
        }),
        Record::Recipe(recipe) => json!({
            "result_id": recipe.result_id,
            "ingredients": recipe
                .ingredients
                .iter()
                .map(|i| json!({ "item_id": i.item_id, "quantity": i.quantity }))
                .collect::<Vec<_>>(),
        }),
        Record::Almanax(day) => {
            let mut rendered = json!({
                "date": day.date,
                "bonus_type": day.bonus_type,
                "description": day.description.get(lang),
                "tribute": {
                    "item_ankama_id": day.tribute_item_id,
                    "item_name": day.tribute_item_name.get(lang),
                    "quantity": day.tribute_quantity,
                },
                "reward_kamas": day.reward_kamas,
            });
            // the reward scales with the caller's level; without one there
            // is nothing meaningful to report
            if let Some(level) = player_level {
                rendered["experience_reward"] = json!(experience_reward(
                    level,
                    day.optimal_level,
                    day.xp_ratio,
                    day.duration,
                ));
            }
            rendered
        }
        Record::Bonus(bonus) => json!({
            "id": bonus.slug,
            "name": bonus.name.get(lang),
        }),
    }
}

/// Level-scaled daily quest experience. Past the optimal level the reward is
/// a 30/70 blend of the optimal-level value and the value at the player's
/// level capped at 1.5x optimal.
fn experience_reward(player_level: i32, optimal_level: i32, xp_ratio: f64, duration: f64) -> i64 {
    let base = |level: f64| level * (100.0 + 2.0 * level).powi(2) / 20.0 * duration * xp_ratio;
    let player = f64::from(player_level);
    let optimal = f64::from(optimal_level);

    if player_level > optimal_level {
        let reward_level = player.min(optimal * 1.5);
        (0.3 * base(optimal) + 0.7 * base(reward_level)).floor() as i64
    } else {
        base(player).floor() as i64
    }
}

fn validate_level(level: Option<i32>) -> Result<Option<i32>, ApiError> {
    match level {
        Some(level) if !(1..=200).contains(&level) => {
            Err(ApiError::InvalidQuery("level out of bounds".to_owned()))
        }
        other => Ok(other),
    }
}

async fn list_table(
    state: Arc<AppState>,
    lang_code: &str,
    table: TableName,
    params: PageParams,
) -> Result<Json<Value>, ApiError> {
    let lang = parse_lang(lang_code)?;
    let page = params.page.max(1);
    let page_size = params.page_size.clamp(1, MAX_PAGE_SIZE);

    let (records, total) = state.store.list(table, (page - 1) * page_size, page_size);
    Ok(Json(json!({
        "page": page,
        "page_size": page_size,
        "total": total,
        "results": records
            .iter()
            .map(|record| render_record(record, lang, None))
            .collect::<Vec<_>>(),
    })))
}

async fn get_by_id(
    state: Arc<AppState>,
    lang_code: &str,
    table: TableName,
    id: i64,
) -> Result<Json<Value>, ApiError> {
    let lang = parse_lang(lang_code)?;
    let record = state
        .store
        .get(table, RecordKey::Id(id))
        .ok_or(ApiError::NotFound)?;
    Ok(Json(render_record(&record, lang, None)))
}

async fn search_entity(
    state: Arc<AppState>,
    lang_code: &str,
    entity: EntityKind,
    params: SearchParams,
) -> Result<Json<Value>, ApiError> {
    let lang = parse_lang(lang_code)?;
    let limit = params.limit.clamp(1, MAX_SEARCH_LIMIT);

    let hits = state
        .search
        .search(state.store.live(), entity, lang, &params.q, limit)
        .await?;
    Ok(Json(json!(hits)))
}

pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Path(lang): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Value>, ApiError> {
    list_table(state, &lang, TableName::Items, params).await
}

pub async fn list_sets(
    State(state): State<Arc<AppState>>,
    Path(lang): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Value>, ApiError> {
    list_table(state, &lang, TableName::Sets, params).await
}

pub async fn list_mounts(
    State(state): State<Arc<AppState>>,
    Path(lang): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Value>, ApiError> {
    list_table(state, &lang, TableName::Mounts, params).await
}

pub async fn list_items_by_category(
    State(state): State<Arc<AppState>>,
    Path((lang, category)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let lang = parse_lang(&lang)?;
    let records = state.store.by_category(TableName::Items, &category);
    Ok(Json(json!(records
        .iter()
        .map(|record| render_record(record, lang, None))
        .collect::<Vec<_>>())))
}

pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path((lang, id)): Path<(String, i64)>,
) -> Result<Json<Value>, ApiError> {
    get_by_id(state, &lang, TableName::Items, id).await
}

pub async fn get_set(
    State(state): State<Arc<AppState>>,
    Path((lang, id)): Path<(String, i64)>,
) -> Result<Json<Value>, ApiError> {
    get_by_id(state, &lang, TableName::Sets, id).await
}

pub async fn get_mount(
    State(state): State<Arc<AppState>>,
    Path((lang, id)): Path<(String, i64)>,
) -> Result<Json<Value>, ApiError> {
    get_by_id(state, &lang, TableName::Mounts, id).await
}

pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    Path((lang, id)): Path<(String, i64)>,
) -> Result<Json<Value>, ApiError> {
    get_by_id(state, &lang, TableName::Recipes, id).await
}

pub async fn search_items(
    State(state): State<Arc<AppState>>,
    Path(lang): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    search_entity(state, &lang, EntityKind::Items, params).await
}

pub async fn search_sets(
    State(state): State<Arc<AppState>>,
    Path(lang): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    search_entity(state, &lang, EntityKind::Sets, params).await
}

pub async fn search_mounts(
    State(state): State<Arc<AppState>>,
    Path(lang): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    search_entity(state, &lang, EntityKind::Mounts, params).await
}

pub async fn list_bonuses(
    State(state): State<Arc<AppState>>,
    Path(lang): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let lang = parse_lang(&lang)?;
    // the bonus catalog is small and fixed, no pagination
    let (records, _) = state.store.list(TableName::Bonuses, 0, usize::MAX);
    Ok(Json(json!(records
        .iter()
        .map(|record| render_record(record, lang, None))
        .collect::<Vec<_>>())))
}

pub async fn search_bonuses(
    State(state): State<Arc<AppState>>,
    Path(lang): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    search_entity(state, &lang, EntityKind::Bonuses, params).await
}

pub async fn almanax_single(
    State(state): State<Arc<AppState>>,
    Path((lang, date)): Path<(String, String)>,
    Query(params): Query<LevelParam>,
) -> Result<Json<Value>, ApiError> {
    let lang = parse_lang(&lang)?;
    let level = validate_level(params.level)?;
    let date: NaiveDate = date
        .parse()
        .map_err(|_| ApiError::InvalidQuery("invalid date".to_owned()))?;

    let record = state
        .store
        .get(TableName::Almanax, RecordKey::Date(date))
        .ok_or(ApiError::NotFound)?;
    Ok(Json(render_record(&record, lang, level)))
}

pub async fn almanax_range(
    State(state): State<Arc<AppState>>,
    Path(lang): Path<String>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Value>, ApiError> {
    let lang = parse_lang(&lang)?;
    let level = validate_level(params.level)?;

    if params.from > params.to {
        return Err(ApiError::InvalidQuery("from is after to".to_owned()));
    }
    if (params.to - params.from).num_days() > MAX_RANGE_DAYS {
        return Err(ApiError::InvalidQuery("range too wide".to_owned()));
    }

    let records = state.store.almanax_range(params.from, params.to);
    Ok(Json(json!(records
        .iter()
        .map(|record| render_record(record, lang, level))
        .collect::<Vec<_>>())))
}

pub async fn trigger_update(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.trigger.request() {
        (StatusCode::ACCEPTED, "refresh scheduled")
    } else {
        (StatusCode::ACCEPTED, "refresh already pending")
    }
}

pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}
