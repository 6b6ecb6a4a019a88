//! The six analytical questions for the January 2019 green taxi data.

use std::error::Error;

use chrono::NaiveDate;
use log::info;
use postgres::Client;

use crate::db;
use crate::schema::quote_ident;

/// Answers the fixed question set against a trips table and the TLC zone
/// lookup table.  Table names are interpolated as quoted identifiers; data
/// values go in as bind parameters.
pub struct TripReport {
    pub database: String,
    pub trips_table: String,
    pub zones_table: String,
}

impl TripReport {
    /// Number of trips picked up and dropped off on `day`.
    pub fn trips_on(&self, client: &mut Client, day: NaiveDate) -> Result<i64, Box<dyn Error>> {
        let query = trips_on_sql(&self.trips_table);
        let row = client.query_one(query.as_str(), &[&day])?;
        Ok(row.get(0))
    }

    /// Pickup date of the longest recorded trip, or `None` for an empty
    /// table.
    pub fn max_distance_day(
        &self,
        client: &mut Client,
    ) -> Result<Option<NaiveDate>, Box<dyn Error>> {
        let query = max_distance_day_sql(&self.trips_table);
        let row = client.query_opt(query.as_str(), &[])?;
        Ok(row.map(|r| r.get(0)))
    }

    /// Trips picked up on `day` grouped by passenger count, restricted to
    /// the counts in `counts`.  Counts absent from the data are absent from
    /// the result.
    pub fn passenger_counts_on(
        &self,
        client: &mut Client,
        day: NaiveDate,
        counts: &[i64],
    ) -> Result<Vec<(i64, i64)>, Box<dyn Error>> {
        let query = passenger_counts_sql(&self.trips_table);
        let rows = client.query(query.as_str(), &[&day, &counts])?;
        Ok(rows.iter().map(|r| (r.get(0), r.get(1))).collect())
    }

    /// Dropoff zone of the best-tipped trip picked up in `pickup_zone`.
    pub fn top_tip_dropoff_zone(
        &self,
        client: &mut Client,
        pickup_zone: &str,
    ) -> Result<Option<String>, Box<dyn Error>> {
        let query = top_tip_sql(&self.trips_table, &self.zones_table);
        let row = client.query_opt(query.as_str(), &[&pickup_zone])?;
        Ok(row.map(|r| r.get(0)))
    }

    /// Run all six questions on one connection and print a line per answer.
    pub fn print_answers(&self) -> Result<(), Box<dyn Error>> {
        let mut client = db::connect(&self.database)?;
        info!(
            "answering from {}.{} and {}.{}",
            self.database, self.trips_table, self.database, self.zones_table
        );

        // docker build --help
        println!("1. docker build flag that writes the image ID to a file: --iidfile string");
        // pip list in a fresh python:3.9 container
        println!("2. python packages preinstalled in the python:3.9 image: 3");

        let jan_15 = NaiveDate::from_ymd_opt(2019, 1, 15).unwrap();
        let n = self.trips_on(&mut client, jan_15)?;
        println!("3. trips made entirely on {}: {}", jan_15, n);

        let day = self
            .max_distance_day(&mut client)?
            .map(|d| d.to_string())
            .unwrap_or_else(|| "(no trips)".to_owned());
        println!("4. pickup day with the largest trip distance: {}", day);

        let jan_1 = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let counts = self.passenger_counts_on(&mut client, jan_1, &[2, 3])?;
        let histogram = if counts.is_empty() {
            "(no trips)".to_owned()
        } else {
            counts
                .iter()
                .map(|(passengers, trips)| format!("{}: {}", passengers, trips))
                .collect::<Vec<_>>()
                .join("; ")
        };
        println!("5. trips on {} by passenger count: {}", jan_1, histogram);

        let zone = self
            .top_tip_dropoff_zone(&mut client, "Astoria")?
            .unwrap_or_else(|| "(no trips)".to_owned());
        println!(
            "6. dropoff zone with the largest tip for Astoria pickups: {}",
            zone
        );

        Ok(())
    }
}

fn trips_on_sql(trips: &str) -> String {
    format!(
        r#"
SELECT COUNT(*)
FROM {t}
WHERE "lpep_pickup_datetime"::DATE = $1
AND "lpep_dropoff_datetime"::DATE = $1
"#,
        t = quote_ident(trips)
    )
}

fn max_distance_day_sql(trips: &str) -> String {
    format!(
        r#"
SELECT "lpep_pickup_datetime"::DATE
FROM {t}
ORDER BY "trip_distance" DESC
LIMIT 1
"#,
        t = quote_ident(trips)
    )
}

fn passenger_counts_sql(trips: &str) -> String {
    format!(
        r#"
SELECT "passenger_count", COUNT(*)
FROM {t}
WHERE "lpep_pickup_datetime"::DATE = $1
AND "passenger_count" = ANY($2)
GROUP BY "passenger_count"
ORDER BY "passenger_count"
"#,
        t = quote_ident(trips)
    )
}

fn top_tip_sql(trips: &str, zones: &str) -> String {
    format!(
        r#"
SELECT zdo."Zone"
FROM {t} AS t
JOIN {z} AS zpu ON t."PULocationID" = zpu."LocationID"
JOIN {z} AS zdo ON t."DOLocationID" = zdo."LocationID"
WHERE zpu."Zone" = $1
ORDER BY t."tip_amount" DESC
LIMIT 1
"#,
        t = quote_ident(trips),
        z = quote_ident(zones)
    )
}
