use sales_analytics::{
    mine_segment_rules, optimize_prices, read_sales_csv, CsvSalesSource, GroupBy, RuleThresholds,
    SalesSource, SegmentDimension, SqliteSalesStore,
};
use std::path::PathBuf;

const SALES_CSV: &str = "\
Invoice ID,Branch,City,Customer type,Gender,Product line,Unit price,Quantity,Tax 5%,Total,Date,Time,Payment,cogs,gross margin percentage,gross income,Rating
750-67-8428,A,Yangon,Member,Female,Health and beauty,74.69,7,26.1415,548.9715,1/5/2019,13:08,Ewallet,522.83,4.761904762,26.1415,9.1
226-31-3081,C,Naypyitaw,Normal,Female,Electronic accessories,15.28,5,3.82,80.22,3/8/2019,10:29,Cash,76.4,4.761904762,3.82,9.6
631-41-3108,A,Yangon,Normal,Male,Home and lifestyle,46.33,7,16.2155,340.5255,3/3/2019,13:23,Credit card,324.31,4.761904762,16.2155,7.4
123-19-1176,A,Yangon,Member,Male,Health and beauty,58.22,8,23.288,489.048,1/27/2019,20:33,Ewallet,465.76,4.761904762,23.288,8.4
373-73-7910,A,Yangon,Normal,Male,Sports and travel,86.31,7,30.2085,634.3785,2/8/2019,10:37,Ewallet,604.17,4.761904762,30.2085,5.3
699-14-3026,C,Naypyitaw,Normal,Male,Electronic accessories,85.39,7,29.8865,627.6165,3/25/2019,18:30,Ewallet,597.73,4.761904762,29.8865,4.1
355-53-5943,A,Yangon,Member,Female,Electronic accessories,68.84,6,20.652,433.692,2/25/2019,14:36,Ewallet,413.04,4.761904762,20.652,5.8
315-22-5665,C,Naypyitaw,Normal,Female,Home and lifestyle,73.56,10,36.78,772.38,2/24/2019,11:38,Ewallet,735.6,4.761904762,36.78,8
665-32-9167,A,Yangon,Member,Female,Health and beauty,36.26,2,3.626,76.146,1/10/2019,17:15,Credit card,72.52,4.761904762,3.626,7.2
692-92-5582,B,Mandalay,Member,Female,Food and beverages,54.84,3,8.226,172.746,2/20/2019,13:27,Credit card,164.52,4.761904762,8.226,5.9
351-62-0822,B,Mandalay,Member,Female,Fashion accessories,14.48,4,2.896,60.816,2/6/2019,18:07,Ewallet,57.92,4.761904762,2.896,4.5
529-56-3974,B,Mandalay,Member,Male,Electronic accessories,25.51,4,5.102,107.142,3/9/2019,17:03,Cash,102.04,4.761904762,5.102,6.8
365-64-0515,A,Yangon,Normal,Female,Electronic accessories,46.95,5,11.7375,246.4875,2/12/2019,10:25,Ewallet,234.75,4.761904762,11.7375,7.1
252-56-2699,A,Yangon,Normal,Male,Food and beverages,43.19,10,21.595,453.495,2/7/2019,16:48,Ewallet,431.9,4.761904762,21.595,8.2
829-34-3910,A,Yangon,Normal,Female,Health and beauty,71.38,10,35.69,749.49,3/29/2019,19:21,Cash,713.8,4.761904762,35.69,5.7
299-46-1805,B,Mandalay,Member,Female,Sports and travel,93.72,6,28.116,590.436,1/15/2019,16:19,Cash,562.32,4.761904762,28.116,4.5
656-95-9349,A,Yangon,Member,Female,Health and beauty,68.93,7,24.1255,506.6355,3/11/2019,11:03,Credit card,482.51,4.761904762,24.1255,4.6
765-26-6951,A,Yangon,Normal,Male,Sports and travel,72.61,6,21.783,457.443,1/1/2019,10:39,Credit card,435.66,4.761904762,21.783,6.9
329-62-1586,A,Yangon,Normal,Male,Food and beverages,54.67,3,8.2005,172.2105,1/21/2019,18:00,Credit card,164.01,4.761904762,8.2005,8.6
319-50-3348,B,Mandalay,Normal,Female,Home and lifestyle,40.3,2,4.03,84.63,3/11/2019,15:30,Ewallet,80.6,4.761904762,4.03,4.4
";

fn temp_path(ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!("sales-pipeline-{}.{}", uuid::Uuid::new_v4(), ext))
}

#[test]
fn stored_sales_price_like_the_source_csv() {
    let from_csv = read_sales_csv(SALES_CSV.as_bytes()).unwrap();
    assert_eq!(from_csv.len(), 20);

    let mut store = SqliteSalesStore::new_in_memory().unwrap();
    assert_eq!(store.insert_sales_batch(&from_csv).unwrap(), 20);
    let from_store = store.get_all_sales().unwrap();
    assert_eq!(from_store.len(), 20);

    for group_by in [GroupBy::product(), GroupBy::product_and_city()] {
        let direct = optimize_prices(&from_csv, &group_by, 3).unwrap();
        let stored = optimize_prices(&from_store, &group_by, 3).unwrap();
        assert!(!direct.is_empty());
        assert_eq!(direct, stored);
    }
}

#[test]
fn latest_sale_sets_the_current_price() {
    let sales = read_sales_csv(SALES_CSV.as_bytes()).unwrap();
    let recs = optimize_prices(&sales, &GroupBy::product_and_city(), 3).unwrap();

    let health = recs
        .iter()
        .find(|r| r.product_line.as_deref() == Some("Health and beauty") && r.city.as_deref() == Some("Yangon"))
        .unwrap();
    // Last Yangon health and beauty sale is 3/29/2019 at 71.38
    assert_eq!(health.current_price, 71.38);
    assert!(health.current_captured_demand_pct.is_some());
}

#[test]
fn csv_file_to_sqlite_file_round_trip() {
    let csv_path = temp_path("csv");
    let db_path = temp_path("db");
    std::fs::write(&csv_path, SALES_CSV).unwrap();

    let sales = CsvSalesSource::new(&csv_path).load_sales().unwrap();
    let inserted = SqliteSalesStore::with_store(&db_path, |store| store.insert_sales_batch(&sales)).unwrap();
    assert_eq!(inserted, 20);

    let reopened = SqliteSalesStore::new(&db_path).unwrap();
    let loaded = reopened.load_sales().unwrap();
    assert_eq!(loaded.len(), 20);
    assert_eq!(
        optimize_prices(&sales, &GroupBy::product(), 2).unwrap(),
        optimize_prices(&loaded, &GroupBy::product(), 2).unwrap()
    );
    reopened.close().unwrap();

    std::fs::remove_file(&csv_path).unwrap();
    std::fs::remove_file(&db_path).unwrap();
}

#[test]
fn basket_rules_from_stored_sales() {
    let sales = read_sales_csv(SALES_CSV.as_bytes()).unwrap();
    let mut store = SqliteSalesStore::new_in_memory().unwrap();
    store.insert_sales_batch(&sales).unwrap();
    let stored = store.get_all_sales().unwrap();

    let segments = mine_segment_rules(&stored, &[SegmentDimension::Branch], &RuleThresholds::default()).unwrap();
    let branches: Vec<String> = segments.iter().map(|s| s.segment[0].1.clone()).collect();
    assert_eq!(branches, vec!["A", "B", "C"]);
    for segment in &segments {
        for rule in &segment.rules {
            assert!(rule.lift > 1.0);
            assert!(rule.confidence >= 0.01);
        }
    }
}
