// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Ingestion under at-least-once delivery

use reliefgrid_core::GeoPoint;
use reliefgrid_ingest::mock::{MockExtractor, MockTranscriber};
use reliefgrid_ingest::{HandleOutcome, IngestionState, Pipeline};
use reliefgrid_storage::{KeyedStore, LocalObjectStore, ObjectCreated, TableStore};
use rust_decimal_macros::dec;
use std::sync::Arc;

const EXTRACTION: &str = "```json\n{\"description\":\"elderly man, leg injury\",\"severity\":\"bad\",\"location_description\":\"blue building\",\"floor\":1}\n```";

/// Duplicate transcript events, delivered concurrently and again after a
/// restart, leave exactly one point.
#[tokio::test]
async fn test_one_point_per_emergency() {
    let dir = tempfile::tempdir().unwrap();
    let objects = Arc::new(LocalObjectStore::new(dir.path().join("objects")));
    let table_dir = dir.path().join("table");

    let transcript_key;
    let emergency_id;
    {
        let table = Arc::new(TableStore::open(&table_dir).await.unwrap());
        let pipeline = Pipeline::new(
            objects.clone(),
            table.clone(),
            Arc::new(MockTranscriber::new(objects.clone(), "yaşlı adam, bacağı yaralı")),
            Arc::new(MockExtractor::new(EXTRACTION)),
        );

        let location = GeoPoint::new(dec!(37.0), dec!(35.32)).unwrap();
        let receipt = pipeline.capture(b"RIFF", location).await.unwrap();
        emergency_id = receipt.emergency_id.clone();
        let job = pipeline.request_transcript(&receipt.voice_path).await.unwrap();
        transcript_key = job.output_key;

        let event = ObjectCreated {
            key: transcript_key.clone(),
        };
        let (a, b, c) = tokio::join!(
            pipeline.handle(&event),
            pipeline.handle(&event),
            pipeline.handle(&event)
        );
        let created = [a.unwrap(), b.unwrap(), c.unwrap()]
            .into_iter()
            .filter(|o| matches!(o, HandleOutcome::Indexed { created: true, .. }))
            .count();
        assert_eq!(created, 1);
    }

    let table = Arc::new(TableStore::open(&table_dir).await.unwrap());
    let pipeline = Pipeline::new(
        objects.clone(),
        table.clone(),
        Arc::new(MockTranscriber::new(objects.clone(), "unused")),
        Arc::new(MockExtractor::new("unused")),
    );
    let outcome = pipeline
        .handle(&ObjectCreated {
            key: transcript_key,
        })
        .await
        .unwrap();
    assert!(matches!(outcome, HandleOutcome::Indexed { created: false, .. }));

    let points = table.query_prefix("POINT", "sy947x").await.unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].sk, format!("sy947x#{}", emergency_id));
    assert_eq!(points[0].description, "elderly man, leg injury");
    assert_eq!(points[0].extra["floor"], 1);

    let status = pipeline.state(&emergency_id).await.unwrap();
    assert_eq!(status.state, IngestionState::Indexed);
}
