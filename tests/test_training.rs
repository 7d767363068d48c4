//! Integration test: catalog regressors

use kolosal_selector::training::{
    r2_score, GradientBoostingConfig, GradientBoostingRegressor, ModelCatalog, ModelKind,
    RandomForestRegressor, Regressor,
};
use kolosal_selector::SelectorError;
use ndarray::{Array1, Array2};

/// y = 2·x0 + x1 on a grid; test points sit between training points
fn regression_data() -> (Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>) {
    let target = |x0: f64, x1: f64| 2.0 * x0 + x1;

    let x_train = Array2::from_shape_fn((48, 2), |(i, j)| {
        if j == 0 { (i % 12) as f64 } else { (i / 12) as f64 * 3.0 }
    });
    let y_train = x_train.rows().into_iter().map(|r| target(r[0], r[1])).collect();

    let x_test = Array2::from_shape_fn((12, 2), |(i, j)| {
        if j == 0 { (i % 6) as f64 * 2.0 + 0.5 } else { (i / 6) as f64 * 3.0 + 1.5 }
    });
    let y_test = x_test.rows().into_iter().map(|r| target(r[0], r[1])).collect();

    (x_train, y_train, x_test, y_test)
}

#[test]
fn test_every_catalog_model_fits() {
    let (x_train, y_train, x_test, y_test) = regression_data();
    let mut catalog = ModelCatalog::default_regressors(Some(42));

    for entry in catalog.iter_mut() {
        let result = entry.model.fit(&x_train, &y_train);
        assert!(result.is_ok(), "{} training should succeed: {:?}", entry.name, result.err());
        assert!(entry.model.is_fitted());

        let y_pred = entry.model.predict(&x_test).unwrap();
        let r2 = r2_score(&y_test, &y_pred).unwrap();
        assert!(r2 > 0.5, "{} R² ({}) should be well above 0", entry.name, r2);
    }
}

#[test]
fn test_unfitted_models_refuse_to_predict() {
    let (_, _, x_test, _) = regression_data();
    let catalog = ModelCatalog::default_regressors(None);

    for entry in catalog.iter() {
        let result = entry.model.predict(&x_test);
        assert!(
            matches!(result, Err(SelectorError::ModelNotFitted)),
            "{} should not predict before fit",
            entry.name
        );
    }
}

#[test]
fn test_feature_width_checked_at_predict() {
    let (x_train, y_train, _, _) = regression_data();
    let mut catalog = ModelCatalog::default_regressors(Some(1));
    let wide = Array2::<f64>::zeros((3, 5));

    for entry in catalog.iter_mut() {
        entry.model.fit(&x_train, &y_train).unwrap();
        assert!(
            matches!(entry.model.predict(&wide), Err(SelectorError::ShapeError { .. })),
            "{} should reject a different feature width",
            entry.name
        );
    }
}

#[test]
fn test_seeded_models_are_deterministic() {
    let (x_train, y_train, x_test, _) = regression_data();

    let predict = || {
        let mut forest = RandomForestRegressor::new(20).with_random_state(11);
        forest.fit(&x_train, &y_train).unwrap();
        let mut boosting = GradientBoostingRegressor::new(GradientBoostingConfig {
            subsample: 0.7,
            random_state: Some(11),
            ..Default::default()
        });
        boosting.fit(&x_train, &y_train).unwrap();
        (forest.predict(&x_test).unwrap(), boosting.predict(&x_test).unwrap())
    };

    assert_eq!(predict(), predict());
}

#[test]
fn test_models_serialize_state() {
    let (x_train, y_train, _, _) = regression_data();

    for kind in ModelKind::ALL {
        let mut model = kind.build(Some(3));
        model.fit(&x_train, &y_train).unwrap();
        let state = model.to_json().unwrap();
        assert!(state.is_object(), "{} state should be a JSON object", kind);
        assert_eq!(model.model_type(), kind.as_str());
    }
}
