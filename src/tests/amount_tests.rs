// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::error::KernelError;
use crate::types::amount::Amount;
use std::string::ToString;

#[test]
fn test_amount_parse() {
    assert_eq!("12.5".parse::<Amount>().unwrap(), Amount(1250));
    assert_eq!("12.50".parse::<Amount>().unwrap(), Amount(1250));
    assert_eq!("10".parse::<Amount>().unwrap(), Amount(1000));
    assert_eq!("-3.07".parse::<Amount>().unwrap(), Amount(-307));
    assert_eq!(".5".parse::<Amount>().unwrap(), Amount(50));
    assert_eq!(" 7 ".parse::<Amount>().unwrap(), Amount(700));
}

#[test]
fn test_amount_parse_rejects_garbage() {
    for bad in ["", "-", ".", "1.234", "abc", "1,5", "1.-5", "99999999999999999999"] {
        assert_eq!(bad.parse::<Amount>(), Err(KernelError::InvalidAmount), "{:?}", bad);
    }
}

#[test]
fn test_amount_display() {
    assert_eq!(Amount(1250).to_string(), "12.50");
    assert_eq!(Amount(-307).to_string(), "-3.07");
    assert_eq!(Amount(5).to_string(), "0.05");
    assert_eq!(Amount::ZERO.to_string(), "0.00");
}

#[test]
fn test_amount_units() {
    assert_eq!(Amount::from_units(3), Some(Amount(300)));
    assert_eq!(Amount::from_units(i64::MAX), None);
    assert_eq!(Amount(100).checked_add(Amount(25)), Some(Amount(125)));
}
