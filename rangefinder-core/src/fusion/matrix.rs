//! Fixed-size linear algebra for the distance filters
//!
//! Plain `[[f64; C]; R]` arrays with const-generic dimensions; every routine
//! writes into a caller-provided output so nothing allocates.

/// Matrix type using const generics
pub type Matrix<const R: usize, const C: usize> = [[f64; C]; R];

/// Square matrix type
pub type SquareMatrix<const N: usize> = Matrix<N, N>;

/// Vector type
pub type Vector<const N: usize> = [f64; N];

/// Identity matrix
pub fn identity<const N: usize>() -> SquareMatrix<N> {
    let mut m = [[0.0; N]; N];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

/// Matrix multiplication: C = A × B
///
/// Dimensions: A[R×K] × B[K×C] = C[R×C]
pub fn multiply<const R: usize, const K: usize, const C: usize>(
    a: &Matrix<R, K>,
    b: &Matrix<K, C>,
    result: &mut Matrix<R, C>,
) {
    for i in 0..R {
        for j in 0..C {
            result[i][j] = 0.0;
            for k in 0..K {
                result[i][j] += a[i][k] * b[k][j];
            }
        }
    }
}

/// Matrix transpose: B = Aᵀ
pub fn transpose<const R: usize, const C: usize>(a: &Matrix<R, C>, result: &mut Matrix<C, R>) {
    for i in 0..R {
        for j in 0..C {
            result[j][i] = a[i][j];
        }
    }
}

/// Matrix addition: C = A + B
pub fn add<const R: usize, const C: usize>(a: &Matrix<R, C>, b: &Matrix<R, C>, result: &mut Matrix<R, C>) {
    for i in 0..R {
        for j in 0..C {
            result[i][j] = a[i][j] + b[i][j];
        }
    }
}

/// Make matrix symmetric: A = (A + Aᵀ) / 2
///
/// Keeps covariances positive definite under rounding.
pub fn make_symmetric<const N: usize>(matrix: &mut SquareMatrix<N>) {
    for i in 0..N {
        for j in i + 1..N {
            let avg = (matrix[i][j] + matrix[j][i]) * 0.5;
            matrix[i][j] = avg;
            matrix[j][i] = avg;
        }
    }
}

/// Matrix-vector multiplication: y = A × x
pub fn matvec<const R: usize, const C: usize>(matrix: &Matrix<R, C>, vector: &Vector<C>, result: &mut Vector<R>) {
    for i in 0..R {
        result[i] = 0.0;
        for j in 0..C {
            result[i] += matrix[i][j] * vector[j];
        }
    }
}

/// Matrix inversion by Gauss-Jordan elimination with partial pivoting
///
/// Returns false if the matrix is singular.
pub fn invert<const N: usize>(a: &SquareMatrix<N>, inv: &mut SquareMatrix<N>) -> bool {
    let mut work = *a;
    *inv = identity();

    for k in 0..N {
        let mut pivot_row = k;
        for i in k + 1..N {
            if work[i][k].abs() > work[pivot_row][k].abs() {
                pivot_row = i;
            }
        }
        if work[pivot_row][k].abs() < 1e-12 {
            return false;
        }
        work.swap(k, pivot_row);
        inv.swap(k, pivot_row);

        let pivot = work[k][k];
        for j in 0..N {
            work[k][j] /= pivot;
            inv[k][j] /= pivot;
        }

        for i in 0..N {
            if i != k {
                let factor = work[i][k];
                for j in 0..N {
                    work[i][j] -= factor * work[k][j];
                    inv[i][j] -= factor * inv[k][j];
                }
            }
        }
    }
    true
}

/// Every entry is finite
pub fn is_finite<const R: usize, const C: usize>(matrix: &Matrix<R, C>) -> bool {
    matrix.iter().flatten().all(|v| v.is_finite())
}
