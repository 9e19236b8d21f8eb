use arrow::datatypes::DataType;

/// Tables and columns taking part in the reviews-per-listing report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCountQuery {
    pub listings_table: String,
    pub reviews_table: String,
    pub listing_id: String,
    pub listing_name: String,
    pub review_id: String,
    /// Column of the reviews table referencing the listing id.
    pub review_listing_key: String,
}

impl Default for ReviewCountQuery {
    fn default() -> Self {
        Self {
            listings_table: "listings".to_string(),
            reviews_table: "reviews".to_string(),
            listing_id: "id".to_string(),
            listing_name: "name".to_string(),
            review_id: "id".to_string(),
            review_listing_key: "listings_review_id".to_string(),
        }
    }
}

impl ReviewCountQuery {
    pub fn with_review_listing_key(mut self, column: &str) -> Self {
        self.review_listing_key = column.to_string();
        self
    }

    pub fn listings_columns(&self) -> Vec<&str> {
        vec![self.listing_id.as_str(), self.listing_name.as_str()]
    }

    pub fn reviews_columns(&self) -> Vec<&str> {
        vec![self.review_id.as_str(), self.review_listing_key.as_str()]
    }

    /// Inner join of listings and reviews, one row per (id, name) with the
    /// number of matching reviews, most reviewed first and ties by id.
    /// Join keys of different numeric types are compared as doubles, any
    /// other mismatch as text.
    pub fn to_sql(&self, listing_key_type: &DataType, review_key_type: &DataType) -> String {
        let listing_key = format!("l.{}", quote_ident(&self.listing_id));
        let review_key = format!("r.{}", quote_ident(&self.review_listing_key));
        let join_condition = if listing_key_type == review_key_type {
            format!("{} = {}", listing_key, review_key)
        } else {
            let common_type = if listing_key_type.is_numeric() && review_key_type.is_numeric() {
                "DOUBLE"
            } else {
                "VARCHAR"
            };
            format!(
                "CAST({listing_key} AS {common_type}) = CAST({review_key} AS {common_type})"
            )
        };

        format!(
            "SELECT {lid} AS {id_alias}, l.{name} AS {name}, COUNT(r.{rid}) AS num_reviews \
             FROM {listings} AS l \
             INNER JOIN {reviews} AS r ON {join_condition} \
             GROUP BY {lid}, l.{name} \
             ORDER BY num_reviews DESC, {id_alias} ASC",
            lid = listing_key,
            id_alias = quote_ident(&self.listing_id),
            name = quote_ident(&self.listing_name),
            rid = quote_ident(&self.review_id),
            listings = quote_ident(&self.listings_table),
            reviews = quote_ident(&self.reviews_table),
            join_condition = join_condition,
        )
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_for_matching_key_types() {
        let sql = ReviewCountQuery::default().to_sql(&DataType::Int64, &DataType::Int64);

        assert_eq!(
            sql,
            "SELECT l.\"id\" AS \"id\", l.\"name\" AS \"name\", COUNT(r.\"id\") AS num_reviews \
             FROM \"listings\" AS l \
             INNER JOIN \"reviews\" AS r ON l.\"id\" = r.\"listings_review_id\" \
             GROUP BY l.\"id\", l.\"name\" \
             ORDER BY num_reviews DESC, \"id\" ASC"
        );
    }

    #[test]
    fn test_sql_casts_mismatched_keys() {
        let sql = ReviewCountQuery::default()
            .with_review_listing_key("listing_id")
            .to_sql(&DataType::Int64, &DataType::Utf8);

        assert!(sql.contains(
            "ON CAST(l.\"id\" AS VARCHAR) = CAST(r.\"listing_id\" AS VARCHAR)"
        ));
    }

    #[test]
    fn test_sql_compares_numeric_keys_as_doubles() {
        let sql = ReviewCountQuery::default().to_sql(&DataType::Int64, &DataType::Float64);

        assert!(sql.contains(
            "ON CAST(l.\"id\" AS DOUBLE) = CAST(r.\"listings_review_id\" AS DOUBLE)"
        ));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
