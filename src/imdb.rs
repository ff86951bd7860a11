//! Scraper facade and the title-narrowing resolver.
//!
//! `Imdb` wires the collaborators together: suggestion search over the
//! transport seam, free-text narrowing down to a single IMDb id, and
//! id-based title lookup through the extraction seam with an optional
//! persistent cache in front.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};
use strsim::levenshtein;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::client::{Fetch, HttpFetcher, TitleSource};
use crate::dataset::Dataset;
use crate::entities::{Entity, SearchResult, Title};
use crate::error::{ImdbError, ImdbResult};
use crate::options::Options;

const SUGGESTION_ENDPOINT: &str = "https://v3.sg.media-imdb.com/suggestion/x";

/// Matches below this confidence are rejected (5 characters wrong).
const CONFIDENCE_THRESHOLD: i64 = 75;

/// The closed set of title categories the resolver narrows to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Movie,
    TvSeries,
}

impl Category {
    /// The upstream category tag candidates are filtered against.
    pub fn tag(self) -> &'static str {
        match self {
            Category::Movie => "movie",
            Category::TvSeries => "tvSeries",
        }
    }
}

impl FromStr for Category {
    type Err = ImdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(Category::Movie),
            "tvSeries" => Ok(Category::TvSeries),
            other => Err(ImdbError::BadMethodCall(format!(
                "invalid category: {other}"
            ))),
        }
    }
}

fn imdb_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // The pattern is a literal; compilation cannot fail.
    PATTERN.get_or_init(|| Regex::new(r"^tt\d{7,8}$").unwrap())
}

/// IMDb metadata scraper facade.
pub struct Imdb {
    options: Options,
    cache: Option<Cache>,
    fetcher: Box<dyn Fetch>,
    source: Box<dyn TitleSource>,
}

impl Imdb {
    /// Builds a scraper over the default HTTP transport. The extraction
    /// collaborator is caller-supplied; HTML parsing lives behind that
    /// seam. Fails only when caching is enabled and the cache directory
    /// is unwritable.
    pub fn new(options: Options, source: Box<dyn TitleSource>) -> ImdbResult<Self> {
        Self::with_fetcher(options, Box::new(HttpFetcher::new()), source)
    }

    /// Same, with an explicit transport. Tests use this to substitute
    /// canned payloads.
    pub fn with_fetcher(
        options: Options,
        fetcher: Box<dyn Fetch>,
        source: Box<dyn TitleSource>,
    ) -> ImdbResult<Self> {
        let cache = if options.cache {
            Some(Cache::new(options.cache_directory())?)
        } else {
            None
        };
        Ok(Self {
            options,
            cache,
            fetcher,
            source,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Best-effort movie lookup: first search hit in the movie category.
    pub fn movie(&self, title: &str) -> ImdbResult<Title> {
        let id = self.narrow(title, Category::Movie, true, None)?;
        self.id(&id)
    }

    /// Movie lookup narrowed to `year` (with one year of tolerance
    /// either side).
    pub fn movie_by_year(&self, title: &str, year: i64) -> ImdbResult<Title> {
        let id = self.narrow(title, Category::Movie, false, Some(year))?;
        self.id(&id)
    }

    /// Best-effort TV series lookup.
    pub fn tv_series(&self, title: &str) -> ImdbResult<Title> {
        let id = self.narrow(title, Category::TvSeries, true, None)?;
        self.id(&id)
    }

    /// TV series lookup narrowed to `year` (±1 tolerance).
    pub fn tv_series_by_year(&self, title: &str, year: i64) -> ImdbResult<Title> {
        let id = self.narrow(title, Category::TvSeries, false, Some(year))?;
        self.id(&id)
    }

    /// Title lookup by IMDb id (`tt` + 7-8 digits). Consults the cache
    /// first when enabled; misses hydrate the raw mapping from the
    /// extraction collaborator and store the result back.
    pub fn id(&self, imdb_id: &str) -> ImdbResult<Title> {
        if !imdb_id_pattern().is_match(imdb_id) {
            return Err(ImdbError::BadMethodCall(format!(
                "invalid IMDb id: {imdb_id}"
            )));
        }

        if let Some(cache) = &self.cache {
            if let Some(title) = cache.get::<Title>(imdb_id) {
                debug!(id = imdb_id, "title served from cache");
                return Ok(title);
            }
        }

        let raw = self.source.raw_title(imdb_id, &self.options)?;
        let title = Title::hydrate(&raw)?;

        if let Some(cache) = &self.cache {
            if !cache.add(imdb_id, &title, None) {
                warn!(id = imdb_id, "failed to cache title");
            }
        }

        Ok(title)
    }

    /// Runs the upstream suggestion search. A malformed or unexpected
    /// payload degrades to an empty result set; only transport failures
    /// surface as errors.
    pub fn search(&self, keyword: &str) -> ImdbResult<Dataset<SearchResult>> {
        let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
        let endpoint = format!("{SUGGESTION_ENDPOINT}/{encoded}.json?includeVideos=0");
        let page = self.fetcher.raw(&endpoint, &self.options)?;

        let Ok(payload) = serde_json::from_str::<Value>(&page) else {
            debug!(keyword, "search payload is not valid JSON");
            return Ok(Dataset::new());
        };
        let Some(items) = payload.get("d").and_then(Value::as_array) else {
            debug!(keyword, "search payload carries no result list");
            return Ok(Dataset::new());
        };

        let mut results = Dataset::new();
        for item in items {
            results.push(SearchResult::hydrate(&suggestion_to_raw(item))?);
        }
        Ok(results)
    }

    /// Narrows a free-text query to exactly one IMDb id.
    ///
    /// Candidates are filtered to `category`; then either the first one
    /// wins (`force_first`), or a `year` window of {y-1, y, y+1}
    /// applies, or the Levenshtein-closest title is kept provided its
    /// confidence (100 minus 5 per character of distance) reaches the
    /// threshold. Anything other than exactly one survivor is an error.
    pub fn narrow(
        &self,
        keyword: &str,
        category: Category,
        force_first: bool,
        year: Option<i64>,
    ) -> ImdbResult<String> {
        let results = self.search(keyword)?;
        if results.is_empty() {
            return Err(no_results(keyword));
        }

        let mut results =
            results.filter(|result, _| result.category.as_deref() == Some(category.tag()));

        if force_first {
            return results
                .first()
                .and_then(|item| item.leaf())
                .and_then(|result| result.id.clone())
                .ok_or_else(|| no_results(keyword));
        }

        if let Some(year) = year {
            results = results.filter(move |result, _| {
                result
                    .year
                    .map_or(false, |y| (year - 1..=year + 1).contains(&y))
            });
        } else {
            let Some(best_id) = closest_match(keyword, &results)? else {
                return Err(no_results(keyword));
            };
            results = results.filter(|result, _| result.id.as_deref() == Some(best_id.as_str()));
        }

        match results.count() {
            0 => Err(no_results(keyword)),
            1 => results
                .first()
                .and_then(|item| item.leaf())
                .and_then(|result| result.id.clone())
                .ok_or_else(|| no_results(keyword)),
            _ => Err(ImdbError::MultipleSearchResults {
                keyword: keyword.to_string(),
                candidates: results.leaves().map(describe).collect(),
            }),
        }
    }
}

/// The id of the candidate whose title is Levenshtein-closest to the
/// query, first wins on ties. Fails when even the best match falls
/// below the confidence threshold.
fn closest_match(keyword: &str, results: &Dataset<SearchResult>) -> ImdbResult<Option<String>> {
    let mut best: Option<(usize, String)> = None;
    for result in results.leaves() {
        let (Some(id), Some(title)) = (&result.id, &result.title) else {
            continue;
        };
        let distance = levenshtein(keyword, title);
        if best.as_ref().map_or(true, |(d, _)| distance < *d) {
            best = Some((distance, id.clone()));
        }
    }

    let Some((distance, id)) = best else {
        return Ok(None);
    };
    let confidence = 100 - distance as i64 * 5;
    if confidence < CONFIDENCE_THRESHOLD {
        debug!(keyword, distance, confidence, "best match below threshold");
        return Err(ImdbError::NoConfidentMatch {
            keyword: keyword.to_string(),
        });
    }
    Ok(Some(id))
}

fn no_results(keyword: &str) -> ImdbError {
    ImdbError::NoSearchResults {
        keyword: keyword.to_string(),
    }
}

/// "Title (year)" label for error messages.
fn describe(result: &SearchResult) -> String {
    let title = result.title.as_deref().unwrap_or("?");
    match result.year {
        Some(year) => format!("{title} ({year})"),
        None => title.to_string(),
    }
}

/// Maps one upstream suggestion item (short field names) into the raw
/// shape `SearchResult` hydrates from. Absent and falsy attributes are
/// dropped.
fn suggestion_to_raw(item: &Value) -> Value {
    let mut raw = Map::new();
    let mut set = |field: &str, value: Option<Value>| {
        if let Some(value) = value {
            raw.insert(field.to_string(), value);
        }
    };
    set("id", non_empty(item.get("id")));
    set("title", non_empty(item.get("l")));
    set(
        "image",
        non_empty(item.get("i").and_then(|i| i.get("imageUrl"))),
    );
    set(
        "year",
        item.get("y").and_then(Value::as_i64).map(|y| json!(y)),
    );
    set("type", non_empty(item.get("q")));
    set("category", non_empty(item.get("qid")));
    set("starring", non_empty(item.get("s")));
    set(
        "rank",
        item.get("rank").and_then(Value::as_i64).map(|r| json!(r)),
    );
    Value::Object(raw)
}

fn non_empty(value: Option<&Value>) -> Option<Value> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| json!(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    struct CannedFetch {
        body: String,
    }

    impl Fetch for CannedFetch {
        fn raw(&self, _url: &str, _options: &Options) -> Result<String, FetchError> {
            Ok(self.body.clone())
        }
    }

    struct CannedSource {
        raw: Value,
    }

    impl TitleSource for CannedSource {
        fn raw_title(&self, _id: &str, _options: &Options) -> Result<Value, FetchError> {
            Ok(self.raw.clone())
        }
    }

    fn suggestion_body(items: Value) -> String {
        json!({ "v": 1, "q": "query", "d": items }).to_string()
    }

    fn scraper(body: String) -> Imdb {
        Imdb::with_fetcher(
            Options::default(),
            Box::new(CannedFetch { body }),
            Box::new(CannedSource {
                raw: json!({"id": "tt0000001", "title": "Canned"}),
            }),
        )
        .unwrap()
    }

    fn room_body() -> String {
        suggestion_body(json!([
            {"id": "tt0368226", "l": "The Room", "y": 2003, "q": "feature", "qid": "movie", "rank": 1},
            {"id": "tt6772950", "l": "The Rooms", "y": 2017, "q": "feature", "qid": "movie", "rank": 2},
            {"id": "tt3170832", "l": "Room", "y": 2015, "q": "feature", "qid": "movie", "rank": 3},
            {"id": "tt9251810", "l": "The Room", "y": 2019, "q": "TV series", "qid": "tvSeries", "rank": 4}
        ]))
    }

    #[test]
    fn test_search_maps_short_field_names() {
        let body = suggestion_body(json!([{
            "id": "tt0368226",
            "l": "The Room",
            "i": {"imageUrl": "https://img.example/room.jpg", "width": 300},
            "y": 2003,
            "q": "feature",
            "qid": "movie",
            "s": "Tommy Wiseau, Juliette Danielle",
            "rank": 120
        }]));
        let results = scraper(body).search("the room").unwrap();
        assert_eq!(results.count(), 1);
        let result = results.leaves().next().unwrap();
        assert_eq!(result.id.as_deref(), Some("tt0368226"));
        assert_eq!(result.title.as_deref(), Some("The Room"));
        assert_eq!(result.image.as_deref(), Some("https://img.example/room.jpg"));
        assert_eq!(result.year, Some(2003));
        assert_eq!(result.kind.as_deref(), Some("feature"));
        assert_eq!(result.category.as_deref(), Some("movie"));
        assert_eq!(result.starring.as_deref(), Some("Tommy Wiseau, Juliette Danielle"));
        assert_eq!(result.rank, Some(120));
        assert!(result.is_movie());
    }

    #[test]
    fn test_search_malformed_payload_is_empty() {
        assert!(scraper("<html>gateway error</html>".to_string())
            .search("x")
            .unwrap()
            .is_empty());
        assert!(scraper(json!({"v": 1}).to_string())
            .search("x")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_narrow_exact_title_beats_near_misses() {
        let id = scraper(room_body())
            .narrow("The Room", Category::Movie, false, None)
            .unwrap();
        assert_eq!(id, "tt0368226");
    }

    #[test]
    fn test_narrow_filters_by_category() {
        let id = scraper(room_body())
            .narrow("The Room", Category::TvSeries, true, None)
            .unwrap();
        assert_eq!(id, "tt9251810");
    }

    #[test]
    fn test_narrow_force_first_uses_rank_order() {
        let body = suggestion_body(json!([
            {"id": "tt10", "l": "Completely Different", "y": 1990, "qid": "movie"},
            {"id": "tt11", "l": "The Room", "y": 2003, "qid": "movie"}
        ]));
        let id = scraper(body)
            .narrow("The Room", Category::Movie, true, None)
            .unwrap();
        assert_eq!(id, "tt10");
    }

    #[test]
    fn test_narrow_year_window_is_inclusive() {
        let body = suggestion_body(json!([
            {"id": "tt20", "l": "Dune", "y": 1984, "qid": "movie"},
            {"id": "tt21", "l": "Dune", "y": 2021, "qid": "movie"}
        ]));
        let scraper = scraper(body);
        // 2020 falls in 2021's {y-1, y, y+1} window.
        assert_eq!(
            scraper.narrow("Dune", Category::Movie, false, Some(2020)).unwrap(),
            "tt21"
        );
        assert_eq!(
            scraper.narrow("Dune", Category::Movie, false, Some(1985)).unwrap(),
            "tt20"
        );
        assert!(matches!(
            scraper.narrow("Dune", Category::Movie, false, Some(2000)),
            Err(ImdbError::NoSearchResults { .. })
        ));
    }

    #[test]
    fn test_narrow_year_window_with_two_survivors_is_ambiguous() {
        let body = suggestion_body(json!([
            {"id": "tt30", "l": "Heat", "y": 1995, "qid": "movie"},
            {"id": "tt31", "l": "Heat", "y": 1996, "qid": "movie"}
        ]));
        let err = scraper(body)
            .narrow("Heat", Category::Movie, false, Some(1995))
            .unwrap_err();
        match err {
            ImdbError::MultipleSearchResults { candidates, .. } => {
                assert_eq!(candidates, vec!["Heat (1995)", "Heat (1996)"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_narrow_distant_titles_fail_confidence() {
        // Every candidate is at distance >= 6, so even the best match
        // scores below 75.
        let body = suggestion_body(json!([
            {"id": "tt40", "l": "Interstellar", "y": 2014, "qid": "movie"},
            {"id": "tt41", "l": "Inception", "y": 2010, "qid": "movie"}
        ]));
        assert!(matches!(
            scraper(body).narrow("Solaris", Category::Movie, false, None),
            Err(ImdbError::NoConfidentMatch { .. })
        ));
    }

    #[test]
    fn test_narrow_empty_search_fails_with_no_results() {
        let body = suggestion_body(json!([]));
        assert!(matches!(
            scraper(body).narrow("anything", Category::Movie, false, None),
            Err(ImdbError::NoSearchResults { .. })
        ));
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("movie".parse::<Category>().unwrap(), Category::Movie);
        assert_eq!("tvSeries".parse::<Category>().unwrap(), Category::TvSeries);
        assert!(matches!(
            "documentary".parse::<Category>(),
            Err(ImdbError::BadMethodCall(_))
        ));
    }

    #[test]
    fn test_id_validates_shape() {
        let scraper = scraper(suggestion_body(json!([])));
        assert!(matches!(
            scraper.id("not-an-id"),
            Err(ImdbError::BadMethodCall(_))
        ));
        assert!(matches!(
            scraper.id("tt123"),
            Err(ImdbError::BadMethodCall(_))
        ));
        assert!(scraper.id("tt0000001").is_ok());
    }

    #[test]
    fn test_id_hydrates_from_source() {
        let title = scraper(suggestion_body(json!([]))).id("tt0000001").unwrap();
        assert_eq!(title.id.as_deref(), Some("tt0000001"));
        assert_eq!(title.title.as_deref(), Some("Canned"));
    }

    #[test]
    fn test_movie_resolves_then_fetches() {
        let title = scraper(room_body()).movie("The Room").unwrap();
        assert_eq!(title.title.as_deref(), Some("Canned"));
    }
}
