use std::fs;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use hinterland_common::{ChunkKey, TilePos, WorldCoord};
use hinterland_world::{
    ChunkError, ChunkState, MapEcho, ObjectKind, Provenance, Terrain, WorldConfig, WorldMap,
};
use tempfile::TempDir;

const IDLE: Duration = Duration::from_secs(60);

fn world(dir: &TempDir) -> WorldMap {
    WorldMap::new(WorldConfig::with_seed(42), dir.path()).expect("world map")
}

#[test]
fn concurrent_requests_start_exactly_one_job() {
    let dir = TempDir::new().expect("temp dir");
    let map = world(&dir);
    let barrier = Barrier::new(8);

    let submitted: usize = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    usize::from(map.request(ChunkKey::ORIGIN))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .sum()
    });

    assert_eq!(submitted, 1);
    assert!(map.wait_idle(IDLE));
    let report = map.resolve_pending();
    assert!(report.failures.is_empty());
    assert_eq!(report.resident, 1);
    assert_eq!(map.state(ChunkKey::ORIGIN), ChunkState::Resident);
}

#[test]
fn keys_are_never_both_generating_and_resident() {
    let dir = TempDir::new().expect("temp dir");
    let map = world(&dir);
    map.update(WorldCoord::new(0, 0));

    for _ in 0..200 {
        {
            let registry = map.registry();
            for key in map.get_visible_chunks(WorldCoord::new(0, 0), 64) {
                let state = registry.state(key);
                assert_ne!(state, ChunkState::Absent, "{key} dropped while in flight");
            }
            if registry.generating_count() == 0 {
                break;
            }
        }
        thread::sleep(Duration::from_millis(5));
    }

    assert!(map.wait_idle(IDLE));
    let report = map.resolve_pending();
    assert_eq!(report.resident + report.generating, 8);
    assert_eq!(report.generating, 0);
}

#[test]
fn origin_chunk_for_seed_42() {
    let dir = TempDir::new().expect("temp dir");
    let map = world(&dir);
    assert!(map.request(ChunkKey::ORIGIN));
    assert!(map.wait_idle(IDLE));
    map.resolve_pending();

    let registry = map.registry();
    let chunk = registry.get(ChunkKey::ORIGIN).expect("resident");
    assert_eq!(chunk.provenance(), Provenance::Generated);

    for row in 6..=8 {
        for col in 6..=8 {
            let tile = chunk.tile(TilePos::new(row, col)).expect("in range");
            assert_eq!(tile.terrain(), Terrain::Sand);
        }
    }
    let camp = chunk.tile(TilePos::new(7, 8)).expect("in range");
    assert!(camp.objects().iter().any(|o| o.kind() == ObjectKind::Camp));
}

#[test]
fn visible_chunks_for_player_at_origin() {
    let dir = TempDir::new().expect("temp dir");
    let map = world(&dir);
    let keys = map.get_visible_chunks(WorldCoord::new(0, 0), 64);
    assert!(keys.contains(&ChunkKey::ORIGIN));
    assert!(!keys.contains(&"1024,0".parse().expect("key")));
}

#[test]
fn saved_chunks_come_back_identical() {
    let dir = TempDir::new().expect("temp dir");
    let key = ChunkKey::containing(-512, 512, 512);

    let original = {
        let map = world(&dir);
        assert!(map.request(key));
        assert!(map.wait_idle(IDLE));
        map.resolve_pending();
        let mut registry = map.registry();
        registry.set_terrain(WorldCoord::new(-480, 544), Terrain::Dirt);
        let record = registry.get(key).expect("resident").to_record();
        drop(registry);
        map.save_all().expect("save");
        record
    };

    let map = world(&dir);
    assert!(map.request(key));
    assert!(map.wait_idle(IDLE));
    assert!(map.resolve_pending().failures.is_empty());

    let registry = map.registry();
    let reloaded = registry.get(key).expect("resident");
    assert_eq!(reloaded.provenance(), Provenance::Loaded);
    for (before, after) in original.tiles.iter().zip(reloaded.tiles()) {
        assert_eq!(before.terrain, after.terrain());
        assert_eq!(before.is_explored, after.is_explored());
        assert_eq!(before.texture, after.texture());
    }
    assert_eq!(
        registry.terrain_at(WorldCoord::new(-480, 544)),
        Some(Terrain::Dirt)
    );
}

#[test]
fn malformed_file_is_reported_not_replaced() {
    let dir = TempDir::new().expect("temp dir");
    let map = world(&dir);
    let key = ChunkKey::containing(512, 0, 512);
    fs::create_dir_all(map.store().dir()).expect("mkdir");
    fs::write(
        map.store().path(key),
        r#"{"type":"Chunk","id":"512,0","position":[512,0],"tiles":[]}"#,
    )
    .expect("write");

    assert!(map.request(key));
    assert!(map.wait_idle(IDLE));
    let report = map.resolve_pending();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, key);
    assert!(matches!(
        report.failures[0].error,
        ChunkError::TileCount {
            expected: 256,
            found: 0
        }
    ));
    assert_eq!(map.state(key), ChunkState::Absent);
    assert!(map.store().path(key).exists());
}

#[test]
fn eviction_hands_summaries_to_the_echo() {
    let dir = TempDir::new().expect("temp dir");
    let map = world(&dir);
    map.update(WorldCoord::new(0, 0));
    assert!(map.wait_idle(IDLE));
    map.resolve_pending();
    map.explore(WorldCoord::new(0, 0));

    let echo = MapEcho::for_world(&map);
    assert!(echo.is_empty());

    let report = map.evict_distant(WorldCoord::new(50_000, 0), Some(&echo));
    assert_eq!(report.evicted.len(), 8);
    assert_eq!(echo.len(), 8);
    let summary = echo.get(ChunkKey::ORIGIN).expect("summary");
    assert!(summary.explored_count() > 0);

    let reopened = MapEcho::for_world(&map);
    assert!(map.wait_idle(IDLE));
    assert_eq!(reopened.keys(), echo.keys());
    assert_eq!(
        reopened.get(ChunkKey::ORIGIN).expect("loaded").tiles(),
        summary.tiles()
    );
}

fn camps_in(map: &WorldMap, key: ChunkKey) -> usize {
    let registry = map.registry();
    registry
        .get(key)
        .expect("resident")
        .tiles()
        .iter()
        .flat_map(|tile| tile.objects())
        .filter(|object| object.kind() == ObjectKind::Camp)
        .count()
}

#[test]
fn camp_exists_once_across_evictions() {
    let dir = TempDir::new().expect("temp dir");
    let map = world(&dir);
    let far = WorldCoord::new(50_000, 0);
    let mut carried = Vec::new();

    for _ in 0..2 {
        assert!(map.request(ChunkKey::ORIGIN));
        assert!(map.wait_idle(IDLE));
        assert!(map.resolve_pending().failures.is_empty());
        assert_eq!(camps_in(&map, ChunkKey::ORIGIN), 1);

        let report = map.evict_distant(far, None);
        assert_eq!(report.evicted, vec![ChunkKey::ORIGIN]);
        carried.extend(report.survivors);
    }

    assert!(map.request(ChunkKey::ORIGIN));
    assert!(map.wait_idle(IDLE));
    map.resolve_pending();
    let carried_camps = carried
        .iter()
        .filter(|object| object.kind() == ObjectKind::Camp)
        .count();
    assert_eq!(carried_camps, 0);
    assert_eq!(camps_in(&map, ChunkKey::ORIGIN), 1);
}

#[test]
fn harvested_objects_stay_harvested_after_reload() {
    let dir = TempDir::new().expect("temp dir");
    let map = world(&dir);
    map.update(WorldCoord::new(0, 0));
    assert!(map.wait_idle(IDLE));
    map.resolve_pending();
    map.save_all().expect("save");

    let (key, coord) = {
        let registry = map.registry();
        let found = registry
            .iter()
            .flat_map(|chunk| {
                chunk
                    .tiles()
                    .iter()
                    .filter(|tile| {
                        tile.terrain() != Terrain::Water
                            && tile
                                .objects()
                                .iter()
                                .any(|object| object.kind() != ObjectKind::Camp)
                    })
                    .map(move |tile| (chunk.key(), chunk.tile_origin(tile.pos())))
            })
            .next()
            .expect("an object outside water");
        found
    };
    assert!(!map.registry().get(key).expect("resident").is_dirty());

    let harvested = map.registry().take_objects(coord);
    assert!(!harvested.is_empty());
    assert!(map.registry().get(key).expect("resident").is_dirty());

    let report = map.evict_distant(WorldCoord::new(50_000, 0), None);
    assert!(report.evicted.contains(&key));

    assert!(map.request(key));
    assert!(map.wait_idle(IDLE));
    assert!(map.resolve_pending().failures.is_empty());
    let registry = map.registry();
    assert!(registry.tile_at(coord).expect("resident").objects().is_empty());
}
