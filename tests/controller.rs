use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use geo::{LineString, Polygon};
use hexsoc::{
    FetchError, FetchRequest, HexDataStore, HexFeature, HexFeatureCollection, HexProperties,
    HexSource, ResolutionLevel, SettleAction, ViewportController,
};

fn level(value: u8) -> ResolutionLevel {
    ResolutionLevel::new(value).expect("valid level")
}

fn cell(id: &str, origin: (f64, f64), count: u64, avg: f64, min: f64, max: f64) -> HexFeature {
    let (x, y) = origin;
    HexFeature {
        properties: HexProperties {
            h3_index: id.to_string(),
            avg_soc: Some(avg),
            min_soc: Some(min),
            max_soc: Some(max),
            count,
            soc_color: None,
        },
        boundary: Polygon::new(
            LineString::from(vec![
                (x, y),
                (x + 1.0, y),
                (x + 1.0, y + 1.0),
                (x, y + 1.0),
                (x, y),
            ]),
            vec![],
        ),
    }
}

/// In-memory stand-in for the aggregation service: one feature list per
/// resolution, a failure switch, and a log of requested resolutions.
struct MapSource {
    features: Mutex<HashMap<u8, Vec<HexFeature>>>,
    fail: AtomicBool,
    requested: Mutex<Vec<u8>>,
}

impl MapSource {
    fn new() -> Self {
        let mut features = HashMap::new();
        features.insert(
            8,
            vec![
                cell("a8", (0.0, 0.0), 10, 50.0, 40.0, 60.0),
                cell("b8", (5.0, 0.0), 5, 70.0, 65.0, 75.0),
            ],
        );
        features.insert(10, vec![cell("a10", (0.0, 0.0), 2, 30.0, 25.0, 35.0)]);
        Self {
            features: Mutex::new(features),
            fail: AtomicBool::new(false),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn requested(&self) -> Vec<u8> {
        self.requested.lock().unwrap().clone()
    }

    fn set_features(&self, resolution: u8, features: Vec<HexFeature>) {
        self.features.lock().unwrap().insert(resolution, features);
    }
}

impl HexSource for &MapSource {
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> impl std::future::Future<Output = Result<HexFeatureCollection, FetchError>> + Send {
        let resolution = request.resolution;
        self.requested.lock().unwrap().push(resolution.get());
        let result = if self.fail.load(Ordering::SeqCst) {
            Err(FetchError::Source("scripted outage".into()))
        } else {
            let features = self
                .features
                .lock()
                .unwrap()
                .get(&resolution.get())
                .cloned()
                .unwrap_or_default();
            Ok(HexFeatureCollection::new(resolution, features))
        };
        async move { result }
    }
}

fn controller(source: &MapSource) -> ViewportController<&MapSource> {
    ViewportController::new(HexDataStore::new(source, "test.csv"))
}

/// Covers both cells at resolution 8.
fn wide_polygon() -> Vec<Vec<(f64, f64)>> {
    vec![vec![(-1.0, -1.0), (7.0, -1.0), (7.0, 2.0), (-1.0, 2.0)]]
}

/// Covers only "a8".
fn narrow_polygon() -> Vec<Vec<(f64, f64)>> {
    vec![vec![(-0.5, -0.5), (1.5, -0.5), (1.5, 1.5), (-0.5, 1.5)]]
}

#[tokio::test]
async fn mount_fetches_default_resolution() {
    let source = MapSource::new();
    let mut controller = controller(&source);
    controller.mount().await.unwrap();

    assert_eq!(controller.resolution(), ResolutionLevel::DEFAULT);
    assert_eq!(controller.collection().unwrap().resolution, level(8));
    assert_eq!(source.requested(), vec![8]);
}

#[tokio::test]
async fn first_settle_is_ignored_once() {
    let source = MapSource::new();
    let mut controller = controller(&source);
    controller.mount().await.unwrap();

    // Initialization settle: no fetch, no resolution change.
    let action = controller.viewport_settled(13.0).await.unwrap();
    assert_eq!(action, SettleAction::Ignored);
    assert_eq!(controller.resolution(), level(8));
    assert_eq!(source.requested(), vec![8]);

    // The next settle at the same zoom is honored.
    let action = controller.viewport_settled(13.0).await.unwrap();
    assert_eq!(action, SettleAction::SwitchedResolution(level(10)));
    assert_eq!(controller.resolution(), level(10));
    assert_eq!(source.requested(), vec![8, 10]);
}

#[tokio::test]
async fn same_resolution_settle_refreshes_once() {
    let source = MapSource::new();
    let mut controller = controller(&source);
    controller.mount().await.unwrap();
    controller.viewport_settled(10.5).await.unwrap();

    // Zoom 10.5 still maps to resolution 8: one re-fetch, no switch.
    let action = controller.viewport_settled(10.5).await.unwrap();
    assert_eq!(action, SettleAction::RefreshedData);
    assert_eq!(source.requested(), vec![8, 8]);
}

#[tokio::test]
async fn polygon_drawn_and_cleared() {
    let source = MapSource::new();
    let mut controller = controller(&source);
    controller.mount().await.unwrap();

    let stats = controller.polygon_drawn(&wide_polygon()).unwrap().clone();
    assert_eq!(stats.hex_count, 2);
    assert_eq!(stats.total_assets, 15);
    assert_eq!(stats.avg_soc, 60.0);
    assert_eq!(stats.min_soc, Some(40.0));
    assert_eq!(stats.max_soc, Some(75.0));
    assert!(stats.total_area_sq_km > 0.0);

    // Redraw replaces the previous selection entirely.
    let stats = controller.polygon_drawn(&narrow_polygon()).unwrap().clone();
    assert_eq!(stats.hex_count, 1);
    assert_eq!(controller.selection().features[0].id(), "a8");

    controller.polygon_cleared();
    assert!(controller.summary().is_none());
    assert!(controller.selection().is_empty());
}

#[tokio::test]
async fn degenerate_polygon_yields_no_summary() {
    let source = MapSource::new();
    let mut controller = controller(&source);
    controller.mount().await.unwrap();

    assert!(controller.polygon_drawn(&wide_polygon()).is_some());
    // A two-point gesture replaces the selection with nothing.
    assert!(controller
        .polygon_drawn(&[vec![(0.0, 0.0), (1.0, 1.0)]])
        .is_none());
    assert!(controller.selection().is_empty());
}

#[tokio::test]
async fn refresh_failure_keeps_stale_collection() {
    let source = MapSource::new();
    let mut controller = controller(&source);
    controller.mount().await.unwrap();
    controller.viewport_settled(10.5).await.unwrap();

    source.fail.store(true, Ordering::SeqCst);
    let err = controller.viewport_settled(10.5).await.unwrap_err();
    assert!(matches!(err, FetchError::Source(_)));

    // Display logic still has the previous dataset to draw.
    let held = controller.collection().unwrap();
    assert_eq!(held.resolution, level(8));
    assert_eq!(held.len(), 2);
}

#[tokio::test]
async fn successful_refresh_recomputes_summary() {
    let source = MapSource::new();
    let mut controller = controller(&source);
    controller.mount().await.unwrap();
    controller.viewport_settled(10.5).await.unwrap();

    let stats = controller.polygon_drawn(&narrow_polygon()).unwrap().clone();
    assert_eq!(stats.hex_count, 1);
    assert_eq!(stats.avg_soc, 50.0);

    // The dataset changes under the still-active polygon.
    source.set_features(8, vec![cell("a8", (0.0, 0.0), 3, 20.0, 10.0, 30.0)]);
    let action = controller.viewport_settled(10.5).await.unwrap();
    assert_eq!(action, SettleAction::RefreshedData);

    let stats = controller.summary().unwrap();
    assert_eq!(stats.hex_count, 1);
    assert_eq!(stats.total_assets, 3);
    assert_eq!(stats.avg_soc, 20.0);
}

#[tokio::test]
async fn switching_resolution_recomputes_against_new_cells() {
    let source = MapSource::new();
    let mut controller = controller(&source);
    controller.mount().await.unwrap();
    controller.viewport_settled(8.0).await.unwrap();

    controller.polygon_drawn(&narrow_polygon());
    assert_eq!(controller.selection().features[0].id(), "a8");

    controller.viewport_settled(13.0).await.unwrap();
    assert_eq!(controller.resolution(), level(10));
    assert_eq!(controller.selection().features[0].id(), "a10");
    assert_eq!(controller.summary().unwrap().total_assets, 2);
}
