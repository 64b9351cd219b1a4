use candles_ws::Candle;
use candles_ws::candles::TradeRejection;

use crate::support::trade;

#[test]
fn two_trades_fold_into_one_candle() {
    let mut candle = Candle::opened(0, &trade(100.0, 5, 0));
    candle.fold(&trade(105.0, 5, 10));

    assert_eq!(candle.open, 100.0);
    assert_eq!(candle.high, 105.0);
    assert_eq!(candle.low, 100.0);
    assert_eq!(candle.close, 105.0);
    assert_eq!(candle.volume, 10);
}

#[test]
fn extremes_track_every_trade() {
    let prices = [100.0, 105.0, 95.0, 102.0, 99.5];
    let mut candle = Candle::opened(0, &trade(prices[0], 1, 0));
    for (i, price) in prices.iter().enumerate().skip(1) {
        candle.fold(&trade(*price, 1, i as i64));
        assert!(candle.low <= candle.open && candle.open <= candle.high);
        assert!(candle.low <= candle.close && candle.close <= candle.high);
    }

    assert_eq!(candle.open, 100.0);
    assert_eq!(candle.high, 105.0);
    assert_eq!(candle.low, 95.0);
    assert_eq!(candle.close, 99.5);
    assert_eq!(candle.volume, 5);
}

#[test]
fn volume_saturates() {
    let mut candle = Candle::opened(0, &trade(1.0, u64::MAX, 0));
    candle.fold(&trade(1.0, 1, 1));
    assert_eq!(candle.volume, u64::MAX);
}

#[test]
fn validate_rejects_broken_trades() {
    assert_eq!(trade(100.0, 1, 0).validate(), Ok(()));
    assert_eq!(trade(100.0, 0, 0).validate(), Err(TradeRejection::ZeroSize));
    assert_eq!(
        trade(0.0, 1, 0).validate(),
        Err(TradeRejection::NonPositivePrice(0.0))
    );
    assert_eq!(
        trade(-3.5, 1, 0).validate(),
        Err(TradeRejection::NonPositivePrice(-3.5))
    );
    assert!(matches!(
        trade(f64::NAN, 1, 0).validate(),
        Err(TradeRejection::NonFinitePrice(_))
    ));
    assert!(matches!(
        trade(f64::INFINITY, 1, 0).validate(),
        Err(TradeRejection::NonFinitePrice(_))
    ));
}
