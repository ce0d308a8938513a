use chrono::{NaiveDate, TimeZone, Utc};
use pulltally::activity::Window;
use pulltally::util::time::{end_of_day, format_date, parse_date, start_of_day};

#[test]
fn test_parse_date() {
    assert_eq!(
        parse_date("2021-01-15").unwrap(),
        NaiveDate::from_ymd_opt(2021, 1, 15).unwrap()
    );
}

#[test]
fn test_parse_date_trims_whitespace() {
    assert_eq!(
        parse_date(" 2021-01-15\n").unwrap(),
        NaiveDate::from_ymd_opt(2021, 1, 15).unwrap()
    );
}

#[test]
fn test_parse_date_rejects_other_layouts() {
    assert!(parse_date("01/15/2021").is_err());
    assert!(parse_date("2021-13-01").is_err());
    assert!(parse_date("").is_err());
}

#[test]
fn test_format_date() {
    let t = Utc.with_ymd_and_hms(2021, 1, 5, 23, 59, 0).unwrap();
    assert_eq!(format_date(&t), "2021-01-05");
}

#[test]
fn test_day_bounds() {
    let day = NaiveDate::from_ymd_opt(2021, 1, 15).unwrap();
    assert_eq!(
        start_of_day(day),
        Utc.with_ymd_and_hms(2021, 1, 15, 0, 0, 0).unwrap()
    );
    assert_eq!(
        end_of_day(day),
        Utc.with_ymd_and_hms(2021, 1, 15, 23, 59, 59).unwrap()
    );
}

#[test]
fn test_window_is_inclusive() {
    let window = Window::from_dates(
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2021, 1, 15).unwrap(),
    )
    .unwrap();

    assert!(window.contains(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()));
    assert!(window.contains(Utc.with_ymd_and_hms(2021, 1, 15, 23, 59, 59).unwrap()));
    assert!(!window.contains(Utc.with_ymd_and_hms(2021, 1, 16, 0, 0, 0).unwrap()));
    assert!(!window.contains(Utc.with_ymd_and_hms(2020, 12, 31, 23, 59, 59).unwrap()));
    assert!(window.is_before(Utc.with_ymd_and_hms(2020, 12, 31, 23, 59, 59).unwrap()));
    assert!(!window.is_before(Utc.with_ymd_and_hms(2021, 1, 20, 0, 0, 0).unwrap()));
}

#[test]
fn test_window_rejects_reversed_bounds() {
    let result = Window::from_dates(
        NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
    );
    assert!(result.is_err());
}

#[test]
fn test_single_day_window() {
    let day = NaiveDate::from_ymd_opt(2021, 3, 3).unwrap();
    let window = Window::from_dates(day, day).unwrap();
    assert!(window.contains(Utc.with_ymd_and_hms(2021, 3, 3, 12, 0, 0).unwrap()));
}
